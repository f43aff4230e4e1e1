use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{generate_lobby_code, normalize_lobby_code, LobbyRecord, LobbyState},
    repository::{LobbyStore, StoreError},
};
use crate::game::GameError;
use crate::shared::AppError;

/// Attempts at finding an unused lobby code before giving up
pub const MAX_CODE_ATTEMPTS: u32 = 16;

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Service for creating and looking up lobbies
pub struct LobbyService {
    store: Arc<dyn LobbyStore>,
    code_generator: CodeGenerator,
}

impl LobbyService {
    pub fn new(store: Arc<dyn LobbyStore>) -> Self {
        Self::with_code_generator(store, Box::new(generate_lobby_code))
    }

    pub fn with_code_generator(store: Arc<dyn LobbyStore>, code_generator: CodeGenerator) -> Self {
        Self {
            store,
            code_generator,
        }
    }

    /// Creates an empty lobby under a fresh random code
    #[instrument(skip(self))]
    pub async fn create_lobby(&self) -> Result<LobbyRecord, AppError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = (self.code_generator)();
            debug!(lobby_code = %code, attempt, "Generated lobby code");

            match self.store.create(&code, &LobbyState::new(code.clone())).await {
                Ok(record) => {
                    info!(lobby_code = %code, "Lobby created successfully");
                    return Ok(record);
                }
                Err(StoreError::CodeTaken(_)) => {
                    warn!(lobby_code = %code, attempt, "Lobby code collision");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Game(GameError::Internal(
            "could not find a free lobby code".to_string(),
        )))
    }

    /// Latest committed record of a lobby; the code is case-insensitive
    #[instrument(skip(self))]
    pub async fn get_lobby(&self, code: &str) -> Result<LobbyRecord, AppError> {
        let normalized = normalize_lobby_code(code)
            .ok_or_else(|| AppError::Game(GameError::LobbyNotFound(code.to_string())))?;
        Ok(self.store.get(&normalized).await?)
    }
}
