use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::LobbyEvent;

const LOBBY_CHANNEL_CAPACITY: usize = 100;

/// Event bus for distributing lobby events throughout the application
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    /// Lobby-specific event channels: lobby code -> sender
    lobby_channels: Arc<RwLock<HashMap<String, broadcast::Sender<LobbyEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an event to all subscribers of a specific lobby
    pub async fn emit_to_lobby(&self, lobby_code: &str, event: LobbyEvent) {
        let sender = self.sender(lobby_code).await;
        let event_name = event.name();

        match sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    lobby_code = %lobby_code,
                    event = event_name,
                    receivers = receiver_count,
                    "Lobby event emitted"
                );
            }
            Err(_) => {
                debug!(
                    lobby_code = %lobby_code,
                    event = event_name,
                    "Lobby event emitted with no receivers"
                );
            }
        }
    }

    /// Subscribe to events for a specific lobby
    pub async fn subscribe_to_lobby(&self, lobby_code: &str) -> broadcast::Receiver<LobbyEvent> {
        self.sender(lobby_code).await.subscribe()
    }

    /// Drops the lobby's channel; its subscriptions end once drained
    pub async fn remove_lobby(&self, lobby_code: &str) {
        if self.lobby_channels.write().await.remove(lobby_code).is_some() {
            debug!(lobby_code = %lobby_code, "Lobby channel removed");
        }
    }

    pub async fn has_lobby(&self, lobby_code: &str) -> bool {
        self.lobby_channels.read().await.contains_key(lobby_code)
    }

    async fn sender(&self, lobby_code: &str) -> broadcast::Sender<LobbyEvent> {
        if let Some(sender) = self.lobby_channels.read().await.get(lobby_code) {
            return sender.clone();
        }

        let mut lobby_channels = self.lobby_channels.write().await;
        lobby_channels
            .entry(lobby_code.to_string())
            .or_insert_with(|| {
                debug!(lobby_code = %lobby_code, "Creating lobby channel");
                broadcast::channel(LOBBY_CHANNEL_CAPACITY).0
            })
            .clone()
    }
}
