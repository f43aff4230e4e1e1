use serde::{Deserialize, Serialize};

use crate::game::errors::{ErrorCode, GameError};
use crate::game::intents::Intent;
use crate::lobby::models::{CreativityMode, LobbyState, Submission};

/// Server-to-client messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot of the lobby at `version`
    State { version: u64, state: LobbyState },
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn state(version: u64, state: LobbyState) -> Self {
        ServerMessage::State { version, state }
    }

    pub fn error(error: &GameError) -> Self {
        ServerMessage::Error {
            code: error.code(),
            message: error.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client-to-server messages, one per client-initiable intent
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        name: String,
    },
    StartGame,
    SubmitPrompt {
        prompt: String,
        #[serde(default)]
        creativity: CreativityMode,
    },
    SubmitMatches {
        matches: Submission,
    },
    React {
        option: String,
        emoji: String,
    },
    SetResultsIndex {
        index: i64,
    },
    ReadyNext,
    NextRound,
    Leave,
}

/// A client message plus the optional `playerId` clients echo back
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "playerId", default)]
    pub player_id: Option<String>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

impl ClientEnvelope {
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        serde_json::from_str(raw).map_err(|e| GameError::InvalidMessage(e.to_string()))
    }

    /// Binds the message to the connection's player.
    ///
    /// A `playerId` naming anyone else is refused.
    pub fn into_intent(self, connection_player: &str) -> Result<Intent, GameError> {
        if let Some(claimed) = &self.player_id {
            if claimed != connection_player {
                return Err(GameError::Unauthorized(format!(
                    "connection is bound to another player than {claimed}"
                )));
            }
        }

        let player_id = connection_player.to_string();
        let intent = match self.message {
            ClientMessage::Join { name } => Intent::Join { player_id, name },
            ClientMessage::StartGame => Intent::StartGame { player_id },
            ClientMessage::SubmitPrompt { prompt, creativity } => Intent::SubmitPrompt {
                player_id,
                prompt,
                creativity,
            },
            ClientMessage::SubmitMatches { matches } => Intent::SubmitMatches { player_id, matches },
            ClientMessage::React { option, emoji } => Intent::React {
                player_id,
                option,
                emoji,
            },
            ClientMessage::SetResultsIndex { index } => Intent::SetResultsIndex { player_id, index },
            ClientMessage::ReadyNext => Intent::ReadyNext { player_id },
            ClientMessage::NextRound => Intent::NextRound { player_id },
            ClientMessage::Leave => Intent::Leave { player_id },
        };
        Ok(intent)
    }
}
