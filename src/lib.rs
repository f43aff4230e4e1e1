// Library crate for the Re:cast lobby server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod event;
pub mod fanout;
pub mod game;
pub mod lobby;
pub mod session;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use event::{EventBus, LobbyEvent, LobbySubscription};
pub use fanout::{FanoutHub, SnapshotQueue};
pub use game::{GameError, GameRules, Intent, LobbyManager};
pub use lobby::{
    models::{LobbyRecord, LobbyState, Phase},
    repository::{InMemoryLobbyStore, LobbyStore},
};
pub use shared::{AppError, AppState};
pub use websockets::{ClientEnvelope, MessageHandler, ServerMessage, SocketWrapper};
