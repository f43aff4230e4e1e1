// Snapshot fan-out to websocket subscribers

pub use hub::{FanoutHub, Subscriber, MAX_CONSECUTIVE_FAILURES};
pub use queue::{MessageKind, QueueClosed, SnapshotQueue, DEFAULT_QUEUE_CAPACITY};
pub use subscriber::LobbyFanoutSubscriber;

mod hub;
mod queue;
mod subscriber;
