use std::time::Duration;

/// How the turn order is chosen when the game starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerOrder {
    /// Fair random shuffle
    #[default]
    Shuffled,
    /// Keep join order (deterministic, used by tests)
    JoinOrder,
}

/// Numeric game rules and engine tunables
#[derive(Debug, Clone)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub rounds_per_player: u32,
    /// Matching phase budget per player
    pub seconds_per_player: u32,
    pub max_name_len: usize,
    pub max_prompt_len: usize,
    pub max_emoji_len: usize,
    pub player_order: PlayerOrder,
    /// CAS attempts before giving up on an intent
    pub max_commit_attempts: u32,
    pub generation_timeout: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            rounds_per_player: 2,
            seconds_per_player: 20,
            max_name_len: 32,
            max_prompt_len: 100,
            max_emoji_len: 16,
            player_order: PlayerOrder::Shuffled,
            max_commit_attempts: 3,
            generation_timeout: Duration::from_secs(30),
        }
    }
}

impl GameRules {
    pub fn with_player_order(mut self, order: PlayerOrder) -> Self {
        self.player_order = order;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn total_rounds(&self, player_count: usize) -> u32 {
        player_count as u32 * self.rounds_per_player
    }

    pub fn matching_budget(&self, player_count: usize) -> Duration {
        Duration::from_secs(u64::from(self.seconds_per_player) * player_count as u64)
    }
}
