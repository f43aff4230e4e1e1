use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::hub::FanoutHub;
use crate::event::{LobbyEvent, LobbyEventError, LobbyEventHandler};
use crate::websockets::messages::ServerMessage;

/// Forwards committed lobby states and per-player errors to websocket subscribers
pub struct LobbyFanoutSubscriber {
    hub: Arc<FanoutHub>,
}

impl LobbyFanoutSubscriber {
    pub fn new(hub: Arc<FanoutHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl LobbyEventHandler for LobbyFanoutSubscriber {
    async fn handle_lobby_event(
        &self,
        lobby_code: &str,
        event: LobbyEvent,
    ) -> Result<(), LobbyEventError> {
        match event {
            LobbyEvent::StateCommitted { version, state } => {
                self.hub.publish_state(lobby_code, version, &state).await?;
            }
            LobbyEvent::IntentRejected { player_id, error } => {
                let sent = self
                    .hub
                    .send_to_player(lobby_code, &player_id, &ServerMessage::error(&error))
                    .await?;
                if sent == 0 {
                    debug!(
                        lobby_code = %lobby_code,
                        player_id = %player_id,
                        "Rejected player has no open connection"
                    );
                }
            }
            LobbyEvent::LobbyPurged => {
                self.hub.remove_lobby(lobby_code).await;
            }
        }
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "LobbyFanoutSubscriber"
    }
}
