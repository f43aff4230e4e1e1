use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::event::{LobbyEventHandler, LobbySubscription};
use crate::game::actor::{ActorContext, Command, CommitOutcome, LobbyActor};
use crate::game::errors::GameError;
use crate::game::intents::Intent;
use crate::lobby::models::LobbyRecord;
use crate::lobby::repository::LobbyStore;

const MAILBOX_CAPACITY: usize = 64;

struct LobbyHandle {
    mailbox: mpsc::Sender<Command>,
    subscriptions: Vec<JoinHandle<()>>,
}

/// Routes intents to per-lobby actors, spawning them on first use
pub struct LobbyManager {
    ctx: ActorContext,
    handlers: Vec<Arc<dyn LobbyEventHandler>>,
    lobbies: RwLock<HashMap<String, LobbyHandle>>,
}

impl LobbyManager {
    /// `handlers` are attached to every lobby's event channel before its actor starts
    pub fn new(ctx: ActorContext, handlers: Vec<Arc<dyn LobbyEventHandler>>) -> Self {
        Self {
            ctx,
            handlers,
            lobbies: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LobbyStore> {
        &self.ctx.store
    }

    /// Applies an intent and waits for the outcome
    #[instrument(skip(self, intent), fields(intent = intent.name()))]
    pub async fn dispatch(&self, code: &str, intent: Intent) -> Result<CommitOutcome, GameError> {
        let (reply, outcome) = oneshot::channel();
        self.send(
            code,
            Command::Apply {
                intent,
                reply: Some(reply),
            },
        )
        .await?;

        outcome
            .await
            .map_err(|_| GameError::Internal("lobby actor stopped".to_string()))?
    }

    /// Queues an intent without waiting. Rejections still reach the player
    /// through the lobby's event channel.
    pub async fn enqueue(&self, code: &str, intent: Intent) -> Result<(), GameError> {
        self.send(
            code,
            Command::Apply {
                intent,
                reply: None,
            },
        )
        .await
    }

    /// Latest committed record of a lobby
    pub async fn snapshot(&self, code: &str) -> Result<LobbyRecord, GameError> {
        Ok(self.ctx.store.get(code).await?)
    }

    /// Stops the lobby's actor and detaches its event handlers
    pub async fn shutdown_lobby(&self, code: &str) {
        let code = code.to_ascii_uppercase();
        let Some(handle) = self.lobbies.write().await.remove(&code) else {
            return;
        };

        if handle.mailbox.send(Command::Shutdown).await.is_err() {
            debug!(lobby_code = %code, "Lobby actor already stopped");
        }
        for subscription in handle.subscriptions {
            subscription.abort();
        }
        info!(lobby_code = %code, "Lobby shut down");
    }

    pub async fn active_lobbies(&self) -> usize {
        self.lobbies.read().await.len()
    }

    async fn send(&self, code: &str, command: Command) -> Result<(), GameError> {
        let code = code.to_ascii_uppercase();
        let mailbox = self.mailbox(&code).await?;

        if let Err(mpsc::error::SendError(command)) = mailbox.send(command).await {
            // The actor exited; start a fresh one and try once more
            warn!(lobby_code = %code, "Lobby mailbox closed, respawning actor");
            self.forget(&code).await;
            let mailbox = self.mailbox(&code).await?;
            mailbox
                .send(command)
                .await
                .map_err(|_| GameError::Internal("lobby actor unavailable".to_string()))?;
        }
        Ok(())
    }

    async fn forget(&self, code: &str) {
        if let Some(handle) = self.lobbies.write().await.remove(code) {
            for subscription in handle.subscriptions {
                subscription.abort();
            }
        }
    }

    async fn mailbox(&self, code: &str) -> Result<mpsc::Sender<Command>, GameError> {
        if let Some(handle) = self.lobbies.read().await.get(code) {
            if !handle.mailbox.is_closed() {
                return Ok(handle.mailbox.clone());
            }
        }

        let mut lobbies = self.lobbies.write().await;
        if let Some(handle) = lobbies.get(code) {
            if !handle.mailbox.is_closed() {
                return Ok(handle.mailbox.clone());
            }
        }

        // Only lobbies that exist get an actor. Checked under the write lock,
        // since a purge deletes the record before shutting the actor down.
        self.ctx.store.get(code).await?;

        let mut subscriptions = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let subscription = LobbySubscription::new(
                code.to_string(),
                handler.clone(),
                self.ctx.event_bus.clone(),
            );
            subscriptions.push(subscription.start().await);
        }

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = LobbyActor::new(code.to_string(), self.ctx.clone(), tx.downgrade());
        tokio::spawn(actor.run(rx));
        info!(lobby_code = %code, "Spawned lobby actor");

        lobbies.insert(
            code.to_string(),
            LobbyHandle {
                mailbox: tx.clone(),
                subscriptions,
            },
        );
        Ok(tx)
    }
}
