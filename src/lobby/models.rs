use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumString};

/// Number of letters in a lobby code
pub const LOBBY_CODE_LEN: usize = 4;

/// One player's assignment of peers to options: option -> player id
pub type Submission = BTreeMap<String, String>;

/// Engine-chosen winner per option (`None` = tie or nobody voted)
pub type RoundResults = BTreeMap<String, Option<String>>;

/// option -> emoji -> click count
pub type Reactions = BTreeMap<String, BTreeMap<String, u32>>;

/// Phases of the lobby state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Phase {
    Lobby,
    Prompt,
    Matching,
    Results,
    GameOver,
}

/// How adventurous the generated options should be.
/// Opaque to the engine, forwarded verbatim to the option generator.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreativityMode {
    #[default]
    Normal,
    Creative,
    Crazy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub points_history: Vec<u32>,
    pub is_host: bool,
    /// Join sequence number, survives the shuffle at game start
    pub join_order: u32,
}

impl Player {
    pub fn new(id: String, name: String, is_host: bool, join_order: u32) -> Self {
        Self {
            id,
            name,
            score: 0,
            points_history: Vec::new(),
            is_host,
            join_order,
        }
    }
}

/// Canonical state of one lobby. Everything a client needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyState {
    pub code: String,
    pub phase: Phase,
    /// Turn order
    pub players: Vec<Player>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub prompt_player_id: Option<String>,
    pub current_prompt: Option<String>,
    pub creativity: Option<CreativityMode>,
    pub options: Vec<String>,
    pub submissions: BTreeMap<String, Submission>,
    pub results: Option<RoundResults>,
    pub ready_players: BTreeSet<String>,
    pub round_start_time: Option<DateTime<Utc>>,
    pub round_deadline: Option<DateTime<Utc>>,
    pub reactions: Reactions,
    pub current_results_index: usize,
    pub next_join_order: u32,
}

impl LobbyState {
    /// Creates an empty lobby waiting for its first player
    pub fn new(code: String) -> Self {
        Self {
            code,
            phase: Phase::Lobby,
            players: Vec::new(),
            current_round: 0,
            total_rounds: 0,
            prompt_player_id: None,
            current_prompt: None,
            creativity: None,
            options: Vec::new(),
            submissions: BTreeMap::new(),
            results: None,
            ready_players: BTreeSet::new(),
            round_start_time: None,
            round_deadline: None,
            reactions: BTreeMap::new(),
            current_results_index: 0,
            next_join_order: 0,
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| p.is_host)
    }

    pub fn is_prompt_player(&self, player_id: &str) -> bool {
        self.prompt_player_id.as_deref() == Some(player_id)
    }

    /// Case-insensitive name lookup
    pub fn name_taken(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.players.iter().any(|p| p.name.to_lowercase() == wanted)
    }

    pub fn everyone_submitted(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|p| self.submissions.contains_key(&p.id))
    }

    pub fn everyone_ready(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|p| self.ready_players.contains(&p.id))
    }

    /// Clears every field that only lives for one round
    pub fn clear_round(&mut self) {
        self.current_prompt = None;
        self.creativity = None;
        self.options.clear();
        self.submissions.clear();
        self.results = None;
        self.ready_players.clear();
        self.round_start_time = None;
        self.round_deadline = None;
        self.reactions.clear();
        self.current_results_index = 0;
    }
}

/// Persisted form of a lobby: state plus the CAS version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyRecord {
    pub state: LobbyState,
    pub version: u64,
    pub last_activity_at: DateTime<Utc>,
}

impl LobbyRecord {
    pub fn new(state: LobbyState) -> Self {
        Self {
            state,
            version: 1,
            last_activity_at: Utc::now(),
        }
    }
}

/// Generates a random 4-letter upper-case lobby code
pub fn generate_lobby_code() -> String {
    let mut rng = rand::rng();
    (0..LOBBY_CODE_LEN)
        .map(|_| rng.random_range(b'A'..=b'Z') as char)
        .collect()
}

/// Upper-cases a user-supplied code, returning `None` if it cannot be a lobby code
pub fn normalize_lobby_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == LOBBY_CODE_LEN && code.chars().all(|c| c.is_ascii_uppercase()) {
        Some(code)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_state() -> LobbyState {
        let mut state = LobbyState::new("ABCD".to_string());
        state.phase = Phase::Results;
        state.players = vec![
            Player::new("p1".to_string(), "Alice".to_string(), true, 0),
            Player::new("p2".to_string(), "Bob".to_string(), false, 1),
        ];
        state.players[0].points_history = vec![1, 2];
        state.players[0].score = 3;
        state.current_round = 1;
        state.total_rounds = 4;
        state.prompt_player_id = Some("p2".to_string());
        state.current_prompt = Some("fruits".to_string());
        state.creativity = Some(CreativityMode::Crazy);
        state.options = vec!["apple".to_string(), "banana".to_string()];
        state.submissions.insert(
            "p1".to_string(),
            Submission::from([("apple".to_string(), "p2".to_string())]),
        );
        state.results = Some(RoundResults::from([
            ("apple".to_string(), Some("p2".to_string())),
            ("banana".to_string(), None),
        ]));
        state.ready_players.insert("p1".to_string());
        state.round_start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        state
            .reactions
            .entry("apple".to_string())
            .or_default()
            .insert("💯".to_string(), 3);
        state.current_results_index = 1;
        state.next_join_order = 2;
        state
    }

    #[test]
    fn test_lobby_state_survives_json_round_trip() {
        let state = sample_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: LobbyState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_lobby_state_uses_camel_case_field_names() {
        let json = serde_json::to_value(sample_state()).unwrap();
        assert_eq!(json["phase"], "results");
        assert_eq!(json["promptPlayerId"], "p2");
        assert_eq!(json["players"][0]["isHost"], true);
        assert_eq!(json["players"][0]["pointsHistory"][1], 2);
        assert_eq!(json["results"]["banana"], serde_json::Value::Null);
        assert_eq!(json["creativity"], "crazy");
    }

    #[test]
    fn test_game_over_phase_serializes_as_camel_case() {
        assert_eq!(
            serde_json::to_string(&Phase::GameOver).unwrap(),
            "\"gameOver\""
        );
        assert_eq!(Phase::GameOver.to_string(), "gameOver");
    }

    #[test]
    fn test_generated_codes_are_four_upper_case_letters() {
        for _ in 0..100 {
            let code = generate_lobby_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_normalize_lobby_code() {
        assert_eq!(normalize_lobby_code(" abcd "), Some("ABCD".to_string()));
        assert_eq!(normalize_lobby_code("AbCd"), Some("ABCD".to_string()));
        assert_eq!(normalize_lobby_code("ABC"), None);
        assert_eq!(normalize_lobby_code("AB1D"), None);
        assert_eq!(normalize_lobby_code("ABCDE"), None);
    }

    #[test]
    fn test_name_taken_is_case_insensitive() {
        let state = sample_state();
        assert!(state.name_taken("alice"));
        assert!(state.name_taken("BOB"));
        assert!(!state.name_taken("Carol"));
    }

    #[test]
    fn test_clear_round_resets_round_fields() {
        let mut state = sample_state();
        state.clear_round();
        assert!(state.options.is_empty());
        assert!(state.submissions.is_empty());
        assert!(state.results.is_none());
        assert!(state.ready_players.is_empty());
        assert!(state.reactions.is_empty());
        assert!(state.current_prompt.is_none());
        assert!(state.round_start_time.is_none());
        assert_eq!(state.current_results_index, 0);
        // scores are not round fields
        assert_eq!(state.players[0].score, 3);
    }
}
