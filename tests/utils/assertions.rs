//! Test assertion helpers - fluent API for verifying lobby snapshots
#![allow(dead_code)] // Test utilities may not all be used in every test

use recast::lobby::models::{LobbyState, Phase};
use recast::websockets::ServerMessage;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct StateAssertion<'a> {
    state: &'a LobbyState,
}

impl<'a> StateAssertion<'a> {
    pub fn of(state: &'a LobbyState) -> Self {
        Self { state }
    }

    pub fn phase(self, expected: Phase) -> Self {
        assert_eq!(self.state.phase, expected, "wrong phase");
        self
    }

    pub fn round(self, expected: u32) -> Self {
        assert_eq!(self.state.current_round, expected, "wrong round");
        self
    }

    pub fn host(self, expected: &str) -> Self {
        let hosts: Vec<&str> = self
            .state
            .players
            .iter()
            .filter(|p| p.is_host)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(hosts, vec![expected], "wrong host");
        self
    }

    pub fn prompt_player(self, expected: Option<&str>) -> Self {
        assert_eq!(
            self.state.prompt_player_id.as_deref(),
            expected,
            "wrong prompt player"
        );
        self
    }

    pub fn players(self, expected: &[&str]) -> Self {
        let ids: Vec<&str> = self.state.players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, expected, "wrong players");
        self
    }

    /// `expected` pairs options with their winner
    pub fn results(self, expected: &[(&str, Option<&str>)]) -> Self {
        let results = self.state.results.as_ref().expect("no results");
        assert_eq!(results.len(), expected.len(), "wrong number of results");
        for (option, winner) in expected {
            assert_eq!(
                results.get(*option).map(|w| w.as_deref()),
                Some(*winner),
                "wrong winner for {option}"
            );
        }
        self
    }

    pub fn points_history(self, player: &str, expected: &[u32]) -> Self {
        let p = self
            .state
            .player(player)
            .unwrap_or_else(|| panic!("{player} not in lobby"));
        assert_eq!(p.points_history, expected, "wrong history for {player}");
        assert_eq!(
            p.score,
            expected.iter().sum::<u32>(),
            "score of {player} does not match history"
        );
        self
    }
}

/// Versions of the state messages, in delivery order
pub fn state_versions(messages: &[ServerMessage]) -> Vec<u64> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::State { version, .. } => Some(*version),
            ServerMessage::Error { .. } => None,
        })
        .collect()
}

pub fn assert_strictly_increasing(versions: &[u64]) {
    assert!(
        versions.windows(2).all(|w| w[0] < w[1]),
        "versions not strictly increasing: {versions:?}"
    );
}

pub fn error_codes(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Error { code, .. } => Some(code.to_string()),
            ServerMessage::State { .. } => None,
        })
        .collect()
}
