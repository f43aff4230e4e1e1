// Per-lobby event channels and the handlers that react to them

pub use bus::EventBus;
pub use events::LobbyEvent;
pub use handler::{LobbyEventError, LobbyEventHandler};
pub use subscription::LobbySubscription;

mod bus;
mod events;
mod handler;
mod subscription;
