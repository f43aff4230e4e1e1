use async_trait::async_trait;
use thiserror::Error;

use super::events::LobbyEvent;

/// Errors that can occur when handling lobby events
#[derive(Debug, Error)]
pub enum LobbyEventError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for components that react to the events of one lobby
///
/// Handlers run on their own subscription task, outside the lobby actor,
/// and see events in the order they were emitted.
#[async_trait]
pub trait LobbyEventHandler: Send + Sync {
    async fn handle_lobby_event(
        &self,
        lobby_code: &str,
        event: LobbyEvent,
    ) -> Result<(), LobbyEventError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn handler_name(&self) -> &'static str;
}
