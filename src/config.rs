use clap::Parser;
use std::time::Duration;

use crate::game::GameRules;
use crate::lobby::CleanupConfig;

/// Hard ceiling on a single option-generation call
pub const MAX_GENERATOR_TIMEOUT_SECS: u64 = 30;
/// Lobbies are kept at least this long after their last activity
pub const MIN_IDLE_TTL_MINS: u64 = 30;

/// Server configuration from command-line flags, falling back to environment variables
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Re:cast party game lobby server")]
pub struct ServerConfig {
    /// Address to bind the HTTP/websocket listener to
    #[clap(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// Postgres connection string, or `memory://` for the in-memory store
    #[clap(long, env = "DATABASE_URL", default_value = "memory://")]
    pub database_url: String,

    /// Option generation endpoint; placeholder options are used when unset
    #[clap(long, env = "OPTION_GENERATOR_URL")]
    pub generator_url: Option<String>,

    #[clap(long, env = "OPTION_GENERATOR_API_KEY", hide_env_values = true)]
    pub generator_api_key: Option<String>,

    /// Seconds before a generation call is abandoned (at most 30)
    #[clap(long, env = "OPTION_GENERATOR_TIMEOUT_SECS", default_value_t = MAX_GENERATOR_TIMEOUT_SECS)]
    pub generator_timeout_secs: u64,

    /// Minutes of inactivity before a lobby is purged (at least 30)
    #[clap(long, env = "LOBBY_IDLE_TTL_MINS", default_value_t = MIN_IDLE_TTL_MINS)]
    pub idle_ttl_mins: u64,

    #[clap(long, env = "CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    pub cleanup_interval_secs: u64,

    /// Secret used to sign session tokens
    #[clap(long, env = "JWT_SECRET", default_value = "your-secret-key", hide_env_values = true)]
    pub jwt_secret: String,
}

impl ServerConfig {
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs.clamp(1, MAX_GENERATOR_TIMEOUT_SECS))
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_mins.max(MIN_IDLE_TTL_MINS) * 60)
    }

    pub fn cleanup_config(&self) -> CleanupConfig {
        CleanupConfig {
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs.max(1)),
            idle_ttl: self.idle_ttl(),
        }
    }

    pub fn game_rules(&self) -> GameRules {
        GameRules::default().with_generation_timeout(self.generator_timeout())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}
