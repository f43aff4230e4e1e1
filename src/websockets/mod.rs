// Public API
pub use handler::{handle_websocket_connection, websocket_handler, GatewayMessageHandler};
pub use messages::{ClientEnvelope, ClientMessage, ServerMessage};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod handler;
pub mod messages;
mod socket;
