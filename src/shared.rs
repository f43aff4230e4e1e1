use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::event::EventBus;
use crate::fanout::{FanoutHub, LobbyFanoutSubscriber};
use crate::game::{ActorContext, ErrorCode, GameError, GameRules, LobbyManager, OptionGenerator};
use crate::lobby::repository::{LobbyStore, StoreError};
use crate::lobby::{LobbyJanitor, LobbyService};
use crate::session::{NameSuggester, PetNameSuggester, TokenConfig};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub lobby_service: Arc<LobbyService>,
    pub lobby_manager: Arc<LobbyManager>,
    pub fanout_hub: Arc<FanoutHub>,
    pub event_bus: EventBus,
    pub token_config: Arc<TokenConfig>,
    pub name_suggester: Arc<dyn NameSuggester>,
}

impl AppState {
    /// Wires the engine, event bus and fanout together around one store
    pub fn new(
        store: Arc<dyn LobbyStore>,
        generator: Arc<dyn OptionGenerator>,
        rules: GameRules,
        token_config: TokenConfig,
        queue_capacity: usize,
    ) -> Self {
        let event_bus = EventBus::new();
        let fanout_hub = Arc::new(FanoutHub::new(queue_capacity));

        let ctx = ActorContext {
            store: store.clone(),
            event_bus: event_bus.clone(),
            generator,
            rules: Arc::new(rules),
        };
        let lobby_manager = Arc::new(LobbyManager::new(
            ctx,
            vec![Arc::new(LobbyFanoutSubscriber::new(fanout_hub.clone()))],
        ));

        Self {
            lobby_service: Arc::new(LobbyService::new(store)),
            lobby_manager,
            fanout_hub,
            event_bus,
            token_config: Arc::new(token_config),
            name_suggester: Arc::new(PetNameSuggester),
        }
    }

    /// Handles needed by the idle-lobby cleanup task
    pub fn janitor(&self) -> LobbyJanitor {
        LobbyJanitor {
            store: self.lobby_manager.store().clone(),
            lobby_manager: self.lobby_manager.clone(),
            fanout_hub: self.fanout_hub.clone(),
            event_bus: self.event_bus.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => AppError::DatabaseError(msg),
            other => AppError::Game(other.into()),
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::JwtError(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidMessage),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
            AppError::Game(e) => {
                let status = match e {
                    GameError::LobbyNotFound(_) => StatusCode::NOT_FOUND,
                    GameError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    GameError::LobbyFull | GameError::NameTaken(_) => StatusCode::CONFLICT,
                    GameError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
                    GameError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error_message = match &self {
            // Keep storage details out of responses
            AppError::DatabaseError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Game(GameError::LobbyNotFound("ABCD".into())), StatusCode::NOT_FOUND, "lobby_not_found")]
    #[case(AppError::Game(GameError::LobbyFull), StatusCode::CONFLICT, "lobby_full")]
    #[case(AppError::Game(GameError::NotHost), StatusCode::BAD_REQUEST, "not_host")]
    #[case(AppError::Unauthorized("bad token".into()), StatusCode::UNAUTHORIZED, "unauthorized")]
    #[case(AppError::BadRequest("playerId".into()), StatusCode::BAD_REQUEST, "invalid_message")]
    #[case(AppError::DatabaseError("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal")]
    fn test_error_responses(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let (actual_status, actual_code) = error.status_and_code();
        assert_eq!(actual_status, status);
        assert_eq!(actual_code.to_string(), code);
    }

    #[test]
    fn test_store_errors_convert() {
        let not_found: AppError = StoreError::NotFound("ABCD".to_string()).into();
        assert!(matches!(not_found, AppError::Game(GameError::LobbyNotFound(_))));

        let unavailable: AppError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(unavailable, AppError::DatabaseError(_)));
    }
}
