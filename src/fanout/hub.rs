use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::queue::{MessageKind, SnapshotQueue, DEFAULT_QUEUE_CAPACITY};
use crate::lobby::models::LobbyState;
use crate::websockets::messages::ServerMessage;

/// Consecutive failed deliveries after which a subscriber is dropped
pub const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Handle returned to a websocket connection when it subscribes
#[derive(Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub lobby_code: String,
    pub player_id: String,
    pub queue: Arc<SnapshotQueue>,
}

struct SubscriberEntry {
    player_id: String,
    queue: Arc<SnapshotQueue>,
    /// Highest state version handed to this subscriber
    last_version: u64,
    consecutive_failures: u32,
}

/// Pushes lobby snapshots and errors to connected clients.
///
/// Each subscriber sees state versions in strictly increasing order; older
/// or repeated versions are skipped.
pub struct FanoutHub {
    lobbies: RwLock<HashMap<String, HashMap<Uuid, SubscriberEntry>>>,
    queue_capacity: usize,
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl FanoutHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            queue_capacity,
        }
    }

    pub async fn subscribe(&self, lobby_code: &str, player_id: &str) -> Subscriber {
        let id = Uuid::new_v4();
        let queue = Arc::new(SnapshotQueue::new(self.queue_capacity));

        let mut lobbies = self.lobbies.write().await;
        let subscribers = lobbies.entry(lobby_code.to_string()).or_default();
        subscribers.insert(
            id,
            SubscriberEntry {
                player_id: player_id.to_string(),
                queue: queue.clone(),
                last_version: 0,
                consecutive_failures: 0,
            },
        );

        info!(
            lobby_code = %lobby_code,
            player_id = %player_id,
            subscriber_id = %id,
            subscribers = subscribers.len(),
            "Subscriber added"
        );

        Subscriber {
            id,
            lobby_code: lobby_code.to_string(),
            player_id: player_id.to_string(),
            queue,
        }
    }

    pub async fn unsubscribe(&self, lobby_code: &str, subscriber_id: Uuid) {
        let mut lobbies = self.lobbies.write().await;
        let Some(subscribers) = lobbies.get_mut(lobby_code) else {
            return;
        };
        if let Some(entry) = subscribers.remove(&subscriber_id) {
            entry.queue.close();
            info!(
                lobby_code = %lobby_code,
                player_id = %entry.player_id,
                subscriber_id = %subscriber_id,
                "Subscriber removed"
            );
        }
        if subscribers.is_empty() {
            lobbies.remove(lobby_code);
        }
    }

    /// Queues a `state` message for every subscriber that has not seen `version` yet.
    ///
    /// Returns the number of subscribers it was queued for.
    pub async fn publish_state(
        &self,
        lobby_code: &str,
        version: u64,
        state: &LobbyState,
    ) -> Result<usize, serde_json::Error> {
        let message = ServerMessage::state(version, state.clone()).to_json()?;

        let mut lobbies = self.lobbies.write().await;
        let Some(subscribers) = lobbies.get_mut(lobby_code) else {
            return Ok(0);
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, entry) in subscribers.iter_mut() {
            if version <= entry.last_version {
                continue;
            }
            match entry.queue.push_state(message.clone()) {
                Ok(()) => {
                    entry.last_version = version;
                    delivered += 1;
                }
                Err(_) => failed.push(*id),
            }
        }
        for id in failed {
            record_failure(lobby_code, subscribers, id);
        }

        debug!(lobby_code = %lobby_code, version, delivered, "Published lobby state");
        Ok(delivered)
    }

    /// Queues the snapshot for one subscriber, e.g. right after it connected
    pub async fn deliver_snapshot(
        &self,
        lobby_code: &str,
        subscriber_id: Uuid,
        version: u64,
        state: &LobbyState,
    ) -> bool {
        let message = match ServerMessage::state(version, state.clone()).to_json() {
            Ok(message) => message,
            Err(e) => {
                warn!(lobby_code = %lobby_code, error = %e, "Failed to serialize snapshot");
                return false;
            }
        };

        let mut lobbies = self.lobbies.write().await;
        let Some(subscribers) = lobbies.get_mut(lobby_code) else {
            return false;
        };
        let Some(entry) = subscribers.get_mut(&subscriber_id) else {
            return false;
        };
        if version <= entry.last_version {
            return false;
        }

        if entry.queue.push_state(message).is_ok() {
            entry.last_version = version;
            true
        } else {
            record_failure(lobby_code, subscribers, subscriber_id);
            false
        }
    }

    /// Queues a message for every connection of one player
    pub async fn send_to_player(
        &self,
        lobby_code: &str,
        player_id: &str,
        message: &ServerMessage,
    ) -> Result<usize, serde_json::Error> {
        let kind = MessageKind::of(message);
        let message = message.to_json()?;

        let mut lobbies = self.lobbies.write().await;
        let Some(subscribers) = lobbies.get_mut(lobby_code) else {
            return Ok(0);
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, entry) in subscribers.iter_mut() {
            if entry.player_id != player_id {
                continue;
            }
            match entry.queue.push(kind, message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => failed.push(*id),
            }
        }
        for id in failed {
            record_failure(lobby_code, subscribers, id);
        }
        Ok(delivered)
    }

    /// Called by the connection writer when the socket rejected a message.
    ///
    /// Returns true if the subscriber was dropped.
    pub async fn report_write_failure(&self, lobby_code: &str, subscriber_id: Uuid) -> bool {
        let mut lobbies = self.lobbies.write().await;
        match lobbies.get_mut(lobby_code) {
            Some(subscribers) => record_failure(lobby_code, subscribers, subscriber_id),
            None => false,
        }
    }

    pub async fn report_write_success(&self, lobby_code: &str, subscriber_id: Uuid) {
        let mut lobbies = self.lobbies.write().await;
        if let Some(entry) = lobbies
            .get_mut(lobby_code)
            .and_then(|subscribers| subscribers.get_mut(&subscriber_id))
        {
            entry.consecutive_failures = 0;
        }
    }

    pub async fn subscriber_count(&self, lobby_code: &str) -> usize {
        self.lobbies
            .read()
            .await
            .get(lobby_code)
            .map_or(0, HashMap::len)
    }

    pub async fn is_subscribed(&self, lobby_code: &str, subscriber_id: Uuid) -> bool {
        self.lobbies
            .read()
            .await
            .get(lobby_code)
            .is_some_and(|subscribers| subscribers.contains_key(&subscriber_id))
    }

    /// Disconnects every subscriber of a lobby
    pub async fn remove_lobby(&self, lobby_code: &str) {
        if let Some(subscribers) = self.lobbies.write().await.remove(lobby_code) {
            for entry in subscribers.values() {
                entry.queue.close();
            }
            info!(
                lobby_code = %lobby_code,
                subscribers = subscribers.len(),
                "Removed lobby subscribers"
            );
        }
    }
}

fn record_failure(
    lobby_code: &str,
    subscribers: &mut HashMap<Uuid, SubscriberEntry>,
    subscriber_id: Uuid,
) -> bool {
    let Some(entry) = subscribers.get_mut(&subscriber_id) else {
        return false;
    };
    entry.consecutive_failures += 1;
    if entry.consecutive_failures < MAX_CONSECUTIVE_FAILURES {
        return false;
    }

    if let Some(entry) = subscribers.remove(&subscriber_id) {
        entry.queue.close();
        warn!(
            lobby_code = %lobby_code,
            player_id = %entry.player_id,
            subscriber_id = %subscriber_id,
            "Dropping subscriber after repeated delivery failures"
        );
    }
    true
}
