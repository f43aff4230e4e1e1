use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{bus::EventBus, handler::LobbyEventHandler};

/// Routes one lobby's events to a handler
pub struct LobbySubscription {
    lobby_code: String,
    handler: Arc<dyn LobbyEventHandler>,
    event_bus: EventBus,
}

impl LobbySubscription {
    pub fn new(lobby_code: String, handler: Arc<dyn LobbyEventHandler>, event_bus: EventBus) -> Self {
        Self {
            lobby_code,
            handler,
            event_bus,
        }
    }

    /// Start the subscription - spawns a background task that listens to lobby events
    /// and routes them to the handler.
    ///
    /// The receiver is registered before this returns, so events emitted
    /// afterwards are never missed.
    pub async fn start(self) -> JoinHandle<()> {
        let lobby_code = self.lobby_code.clone();
        let handler_name = self.handler.handler_name();

        info!(
            lobby_code = %lobby_code,
            handler = handler_name,
            "Starting lobby subscription"
        );

        let mut receiver = self.event_bus.subscribe_to_lobby(&lobby_code).await;

        tokio::spawn(async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        // Snapshots are cumulative, the next one catches up
                        warn!(
                            lobby_code = %lobby_code,
                            handler = handler_name,
                            skipped,
                            "Lobby subscription lagged"
                        );
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                debug!(
                    lobby_code = %lobby_code,
                    handler = handler_name,
                    event = event.name(),
                    "Received lobby event"
                );

                if let Err(e) = self.handler.handle_lobby_event(&lobby_code, event).await {
                    warn!(
                        lobby_code = %lobby_code,
                        handler = handler_name,
                        error = %e,
                        "Lobby event handler failed"
                    );
                }
            }

            info!(
                lobby_code = %lobby_code,
                handler = handler_name,
                "Lobby subscription ended"
            );
        })
    }
}
