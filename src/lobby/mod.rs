// Public API - what other modules can use
pub use cleanup_task::{cleanup_idle_lobbies, start_cleanup_task, CleanupConfig, LobbyJanitor};
pub use handlers::{create_lobby, get_lobby, health};
pub use service::LobbyService;
pub use types::{CreateLobbyResponse, LobbySnapshotResponse};

// Internal modules
mod cleanup_task;
mod handlers;
pub mod models;
pub mod repository;
mod service;
mod types;
