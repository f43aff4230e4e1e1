use std::sync::Arc;

use crate::game::errors::GameError;
use crate::lobby::models::LobbyState;

/// Events published on a lobby's channel.
///
/// Events describe things that already happened. The lobby actor is the
/// only producer of `StateCommitted`, so those arrive in commit order.
#[derive(Debug, Clone)]
pub enum LobbyEvent {
    /// A new version of the lobby was written to the store
    StateCommitted {
        version: u64,
        state: Arc<LobbyState>,
    },

    /// An intent from this player was refused, or a failure concerns only them
    IntentRejected { player_id: String, error: GameError },

    /// The lobby was removed by the cleanup task
    LobbyPurged,
}

impl LobbyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LobbyEvent::StateCommitted { .. } => "STATE_COMMITTED",
            LobbyEvent::IntentRejected { .. } => "INTENT_REJECTED",
            LobbyEvent::LobbyPurged => "LOBBY_PURGED",
        }
    }
}
