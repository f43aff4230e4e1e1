#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::{json, Value};
use tokio::time::{sleep, timeout, Duration};

use recast::game::{CommitOutcome, GameError, Intent};
use recast::lobby::models::{LobbyRecord, LobbyState, Phase};
use recast::websockets::{ClientEnvelope, MessageHandler, ServerMessage};

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Sends a raw message through the gateway like a websocket would, and
    /// gives the actor a moment to process it
    pub async fn send_message(&self, player: &str, message: Value) -> Option<ServerMessage> {
        let reply = self
            .gateway
            .handle_message(player, &self.code, message.to_string())
            .await;
        sleep(Duration::from_millis(10)).await;
        reply
    }

    /// Parses a client message as the gateway does, then waits for the outcome
    pub async fn dispatch(&self, player: &str, message: Value) -> Result<CommitOutcome, GameError> {
        let intent = ClientEnvelope::parse(&message.to_string())?.into_intent(player)?;
        self.app_state.lobby_manager.dispatch(&self.code, intent).await
    }

    /// Posts an engine-internal intent
    pub async fn dispatch_internal(&self, intent: Intent) -> Result<CommitOutcome, GameError> {
        self.app_state.lobby_manager.dispatch(&self.code, intent).await
    }

    pub async fn snapshot(&self) -> LobbyRecord {
        self.app_state.lobby_manager.snapshot(&self.code).await.unwrap()
    }

    /// Polls the store until `predicate` holds
    pub async fn wait_for<F>(&self, predicate: F) -> LobbyRecord
    where
        F: Fn(&LobbyState) -> bool,
    {
        for _ in 0..200 {
            let record = self.snapshot().await;
            if predicate(&record.state) {
                return record;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("lobby {} never reached the expected state", self.code);
    }

    pub async fn wait_for_phase(&self, phase: Phase) -> LobbyRecord {
        self.wait_for(|state| state.phase == phase).await
    }

    /// Every message queued for the player so far
    pub async fn drain_messages(&self, player: &str) -> Vec<ServerMessage> {
        let queue = &self.subscribers[player].queue;
        let mut messages = Vec::new();
        while let Ok(Some(raw)) = timeout(Duration::from_millis(50), queue.pop()).await {
            messages.push(serde_json::from_str(&raw).unwrap());
        }
        messages
    }

    /// Latest state message queued for the player, discarding the rest
    pub async fn latest_state(&self, player: &str) -> (u64, LobbyState) {
        self.drain_messages(player)
            .await
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::State { version, state } => Some((version, state)),
                ServerMessage::Error { .. } => None,
            })
            .last()
            .unwrap_or_else(|| panic!("{player} received no state"))
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn start_game(&self, player: &str) -> Result<CommitOutcome, GameError> {
        self.dispatch(player, json!({"type": "start_game"})).await
    }

    pub async fn submit_prompt(&self, player: &str, prompt: &str) -> Result<CommitOutcome, GameError> {
        self.dispatch(player, json!({"type": "submit_prompt", "prompt": prompt}))
            .await
    }

    /// `matches` pairs options with player ids
    pub async fn submit_matches(
        &self,
        player: &str,
        matches: &[(&str, &str)],
    ) -> Result<CommitOutcome, GameError> {
        let matches: serde_json::Map<String, Value> = matches
            .iter()
            .map(|(option, assigned)| (option.to_string(), json!(assigned)))
            .collect();
        self.dispatch(player, json!({"type": "submit_matches", "matches": matches}))
            .await
    }

    pub async fn ready_next(&self, player: &str) -> Result<CommitOutcome, GameError> {
        self.dispatch(player, json!({"type": "ready_next"})).await
    }

    pub async fn next_round(&self, player: &str) -> Result<CommitOutcome, GameError> {
        self.dispatch(player, json!({"type": "next_round"})).await
    }

    pub async fn leave(&self, player: &str) -> Result<CommitOutcome, GameError> {
        self.dispatch(player, json!({"type": "leave"})).await
    }

    /// Starts the game as the host and plays the prompt until matching begins
    pub async fn start_round_with_prompt(&self, prompt: &str) -> LobbyRecord {
        self.start_game(&self.players[0]).await.unwrap();
        self.play_prompt(prompt).await
    }

    /// Current prompt player submits `prompt`; waits for the options
    pub async fn play_prompt(&self, prompt: &str) -> LobbyRecord {
        let state = self.snapshot().await.state;
        let prompt_player = state.prompt_player_id.expect("no prompt player");
        self.submit_prompt(&prompt_player, prompt).await.unwrap();
        self.wait_for_phase(Phase::Matching).await
    }
}

impl TestSetup {
    /// Waits until an error message reaches the player and returns its code
    pub async fn wait_for_error(&self, player: &str) -> String {
        for _ in 0..20 {
            for message in self.drain_messages(player).await {
                if let ServerMessage::Error { code, .. } = message {
                    return code.to_string();
                }
            }
        }
        panic!("{player} never received an error");
    }
}
