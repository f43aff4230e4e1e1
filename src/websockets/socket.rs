use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fanout::{FanoutHub, MessageKind, Subscriber};
use crate::websockets::messages::ServerMessage;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a raw client message. A returned message goes straight back to
    /// the sender only.
    async fn handle_message(
        &self,
        player_id: &str,
        lobby_code: &str,
        message: String,
    ) -> Option<ServerMessage>;
}

#[derive(Debug)]
pub enum SocketError {
    ConnectionClosed,
    SendFailed(String),
    ReceiveFailed(String),
    /// The fanout hub dropped this subscriber after repeated failed writes
    Evicted,
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings are answered by axum; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// A subscribed websocket: drains the subscriber's queue into the socket and
/// feeds client messages to the handler
pub struct Connection {
    subscriber: Subscriber,
    hub: Arc<FanoutHub>,
    socket: Box<dyn SocketWrapper>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        subscriber: Subscriber,
        hub: Arc<FanoutHub>,
        socket: Box<dyn SocketWrapper>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            subscriber,
            hub,
            socket,
            message_handler,
        }
    }

    /// Run the connection until either side goes away
    pub async fn run(mut self) -> Result<(), SocketError> {
        let lobby_code = self.subscriber.lobby_code.clone();
        let player_id = self.subscriber.player_id.clone();
        let queue = self.subscriber.queue.clone();

        loop {
            tokio::select! {
                outbound = queue.pop() => {
                    let Some(message) = outbound else {
                        debug!(lobby_code = %lobby_code, player_id = %player_id, "Subscriber queue closed");
                        break;
                    };
                    match self.socket.send_message(message).await {
                        Ok(()) => {
                            self.hub
                                .report_write_success(&lobby_code, self.subscriber.id)
                                .await;
                        }
                        Err(e) => {
                            warn!(lobby_code = %lobby_code, player_id = %player_id, error = ?e, "Socket write failed");
                            if self.hub.report_write_failure(&lobby_code, self.subscriber.id).await {
                                return Err(SocketError::Evicted);
                            }
                        }
                    }
                }

                inbound = self.socket.receive_message() => {
                    match inbound {
                        Ok(Some(message)) => {
                            let reply = self
                                .message_handler
                                .handle_message(&player_id, &lobby_code, message)
                                .await;
                            if let Some(reply) = reply {
                                match reply.to_json() {
                                    Ok(json) => {
                                        if queue.push(MessageKind::of(&reply), json).is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => warn!(error = %e, "Failed to serialize reply"),
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let _ = self.socket.close().await;
        Ok(())
    }
}
