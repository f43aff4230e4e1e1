use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::websockets::ServerMessage;

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// What a queued message carries. Only snapshots are safe to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    State,
    Error,
}

impl MessageKind {
    pub fn of(message: &ServerMessage) -> Self {
        match message {
            ServerMessage::State { .. } => MessageKind::State,
            ServerMessage::Error { .. } => MessageKind::Error,
        }
    }
}

/// Returned when pushing into a queue whose consumer has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

struct QueueInner {
    messages: VecDeque<(MessageKind, String)>,
    closed: bool,
    dropped: u64,
}

/// Bounded outbound queue of one websocket subscriber.
///
/// When full, the oldest queued snapshot is dropped to make room; the newest
/// message is always kept. Snapshots are cumulative, so a slow client only
/// loses intermediate versions. Errors are evicted only once no snapshot is
/// left to drop.
pub struct SnapshotQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl SnapshotQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                messages: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push_state(&self, message: String) -> Result<(), QueueClosed> {
        self.push(MessageKind::State, message)
    }

    pub fn push(&self, kind: MessageKind, message: String) -> Result<(), QueueClosed> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(QueueClosed);
            }
            if inner.messages.len() >= self.capacity {
                let evict = inner
                    .messages
                    .iter()
                    .position(|(queued, _)| *queued == MessageKind::State)
                    .unwrap_or(0);
                inner.messages.remove(evict);
                inner.dropped += 1;
            }
            inner.messages.push_back((kind, message));
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for the next message. `None` once the queue is closed.
    pub async fn pop(&self) -> Option<String> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.closed {
                    return None;
                }
                if let Some((_, message)) = inner.messages.pop_front() {
                    return Some(message);
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.inner.lock().unwrap().dropped
    }
}

impl Default for SnapshotQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
