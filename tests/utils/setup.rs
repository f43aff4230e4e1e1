use std::collections::HashMap;
use std::sync::Arc;

use recast::fanout::{Subscriber, DEFAULT_QUEUE_CAPACITY};
use recast::game::{GameRules, Intent, OptionGenerator, PlayerOrder};
use recast::session::TokenConfig;
use recast::websockets::GatewayMessageHandler;
use recast::{AppState, InMemoryLobbyStore};

use super::mocks::FixtureGenerator;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app_state: AppState,
    pub store: Arc<InMemoryLobbyStore>,
    pub gateway: GatewayMessageHandler,
    pub code: String,
    /// Player ids in join order
    pub players: Vec<String>,
    /// One fan-out subscription per player, standing in for their websocket
    pub subscribers: HashMap<String, Subscriber>,
}

pub struct TestSetupBuilder {
    players: Vec<String>,
    generator: Arc<dyn OptionGenerator>,
    rules: GameRules,
    queue_capacity: usize,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            players: vec![],
            generator: Arc::new(FixtureGenerator::new()),
            rules: GameRules::default().with_player_order(PlayerOrder::JoinOrder),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Player ids; display names are the capitalized ids
    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_three_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "carol"])
    }

    pub fn with_generator(mut self, generator: Arc<dyn OptionGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_rules(mut self, rules: GameRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub async fn build(self) -> TestSetup {
        let store = Arc::new(InMemoryLobbyStore::new());
        let app_state = AppState::new(
            store.clone(),
            self.generator,
            self.rules,
            TokenConfig::new("test-secret", 1),
            self.queue_capacity,
        );

        let code = app_state
            .lobby_service
            .create_lobby()
            .await
            .unwrap()
            .state
            .code;

        let mut subscribers = HashMap::new();
        for player in &self.players {
            let subscriber = app_state.fanout_hub.subscribe(&code, player).await;
            subscribers.insert(player.clone(), subscriber);

            app_state
                .lobby_manager
                .dispatch(
                    &code,
                    Intent::Join {
                        player_id: player.clone(),
                        name: display_name(player),
                    },
                )
                .await
                .unwrap();
        }

        let gateway = GatewayMessageHandler::new(app_state.lobby_manager.clone());

        TestSetup {
            app_state,
            store,
            gateway,
            code,
            players: self.players,
            subscribers,
        }
    }
}

pub fn display_name(player_id: &str) -> String {
    let mut chars = player_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
