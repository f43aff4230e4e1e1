#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use recast::game::{GenerationError, OptionGenerator};
use recast::lobby::models::CreativityMode;
use recast::websockets::{SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Option generator that replays scripted responses, then falls back to
/// numbered placeholders
#[derive(Clone, Default)]
pub struct FixtureGenerator {
    responses: Arc<Mutex<VecDeque<Result<Vec<String>, GenerationError>>>>,
    calls: Arc<AtomicUsize>,
}

impl FixtureGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_options(self, options: &[&str]) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(options.iter().map(|o| o.to_string()).collect()));
        self
    }

    pub fn then_error(self, error: GenerationError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionGenerator for FixtureGenerator {
    async fn generate(
        &self,
        prompt: &str,
        player_count: usize,
        _creativity: CreativityMode,
    ) -> Result<Vec<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok((1..=player_count).map(|i| format!("{prompt} #{i}")).collect()),
        }
    }
}

/// Option generator whose calls never complete
#[derive(Clone, Default)]
pub struct HangingGenerator {
    calls: Arc<AtomicUsize>,
}

impl HangingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionGenerator for HangingGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _player_count: usize,
        _creativity: CreativityMode,
    ) -> Result<Vec<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Client side of a [`MockSocket`]
pub struct MockClient {
    inbound: Option<mpsc::UnboundedSender<String>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl MockClient {
    pub fn send(&self, message: &str) {
        if let Some(inbound) = &self.inbound {
            inbound.send(message.to_string()).unwrap();
        }
    }

    /// Next message the server wrote, or None after a second of silence
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(std::time::Duration::from_secs(1), self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Hangs up; the server sees the socket close
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }
}

/// In-memory websocket backed by channels
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl MockSocket {
    pub fn pair() -> (MockSocket, MockClient) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            MockSocket {
                inbound: in_rx,
                outbound: out_tx,
            },
            MockClient {
                inbound: Some(in_tx),
                outbound: out_rx,
            },
        )
    }
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.outbound
            .send(message)
            .map_err(|_| SocketError::ConnectionClosed)
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        Ok(())
    }
}
