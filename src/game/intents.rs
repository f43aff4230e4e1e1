use strum_macros::IntoStaticStr;

use crate::lobby::models::{CreativityMode, Submission};

/// A request to mutate one lobby.
///
/// Client intents carry the id of the player the connection is bound to.
/// `OptionsReady`, `GenerationFailed` and `TimeUp` are produced internally
/// by the option generator and the round timer.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Join {
        player_id: String,
        name: String,
    },
    StartGame {
        player_id: String,
    },
    SubmitPrompt {
        player_id: String,
        prompt: String,
        creativity: CreativityMode,
    },
    OptionsReady {
        round: u32,
        prompt: String,
        options: Vec<String>,
    },
    GenerationFailed {
        round: u32,
        prompt: String,
        player_id: String,
        reason: String,
    },
    SubmitMatches {
        player_id: String,
        matches: Submission,
    },
    TimeUp {
        round: u32,
    },
    React {
        player_id: String,
        option: String,
        emoji: String,
    },
    SetResultsIndex {
        player_id: String,
        index: i64,
    },
    ReadyNext {
        player_id: String,
    },
    NextRound {
        player_id: String,
    },
    Leave {
        player_id: String,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The player an intent acts on behalf of, if any
    pub fn player_id(&self) -> Option<&str> {
        match self {
            Intent::Join { player_id, .. }
            | Intent::StartGame { player_id }
            | Intent::SubmitPrompt { player_id, .. }
            | Intent::GenerationFailed { player_id, .. }
            | Intent::SubmitMatches { player_id, .. }
            | Intent::React { player_id, .. }
            | Intent::SetResultsIndex { player_id, .. }
            | Intent::ReadyNext { player_id }
            | Intent::NextRound { player_id }
            | Intent::Leave { player_id } => Some(player_id),
            Intent::OptionsReady { .. } | Intent::TimeUp { .. } => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Intent::OptionsReady { .. } | Intent::GenerationFailed { .. } | Intent::TimeUp { .. }
        )
    }
}
