use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use super::repository::LobbyStore;
use crate::event::{EventBus, LobbyEvent};
use crate::fanout::FanoutHub;
use crate::game::LobbyManager;
use crate::shared::AppError;

/// Idle lobbies are never purged sooner than this
pub const MIN_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long a lobby must be idle before it is purged
    pub idle_ttl: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5 * 60),
            idle_ttl: MIN_IDLE_TTL,
        }
    }
}

/// Everything a purge has to touch
#[derive(Clone)]
pub struct LobbyJanitor {
    pub store: Arc<dyn LobbyStore>,
    pub lobby_manager: Arc<LobbyManager>,
    pub fanout_hub: Arc<FanoutHub>,
    pub event_bus: EventBus,
}

/// Starts the background task that periodically purges idle lobbies
#[instrument(skip(janitor))]
pub async fn start_cleanup_task(janitor: LobbyJanitor, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        idle_ttl_secs = config.idle_ttl.as_secs(),
        "Starting lobby cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        match cleanup_idle_lobbies(&janitor, config.idle_ttl).await {
            Ok(purged) => {
                debug!(purged, "Lobby cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Lobby cleanup task failed");
            }
        }
    }
}

/// Purges lobbies idle for longer than `idle_ttl` that nobody is connected to.
///
/// Returns the number of lobbies removed.
pub async fn cleanup_idle_lobbies(
    janitor: &LobbyJanitor,
    idle_ttl: Duration,
) -> Result<usize, AppError> {
    let idle = janitor.store.list_idle(idle_ttl.max(MIN_IDLE_TTL)).await?;
    if idle.is_empty() {
        return Ok(0);
    }

    let mut purged = 0;
    for code in idle {
        if janitor.fanout_hub.subscriber_count(&code).await > 0 {
            debug!(lobby_code = %code, "Idle lobby still has subscribers, keeping it");
            continue;
        }

        match purge_lobby(janitor, &code).await {
            Ok(()) => {
                purged += 1;
                info!(lobby_code = %code, "Purged idle lobby");
            }
            Err(e) => {
                warn!(lobby_code = %code, error = %e, "Failed to purge idle lobby");
            }
        }
    }

    Ok(purged)
}

/// Deletes the record before stopping the actor, so a dispatch arriving
/// in between finds nothing to respawn.
async fn purge_lobby(janitor: &LobbyJanitor, code: &str) -> Result<(), AppError> {
    janitor.store.delete(code).await?;
    janitor.lobby_manager.shutdown_lobby(code).await;

    janitor
        .event_bus
        .emit_to_lobby(code, LobbyEvent::LobbyPurged)
        .await;
    janitor.event_bus.remove_lobby(code).await;
    janitor.fanout_hub.remove_lobby(code).await;
    Ok(())
}
