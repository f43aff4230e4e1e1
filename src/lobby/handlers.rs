use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{CreateLobbyResponse, LobbySnapshotResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new lobby
///
/// POST /lobby
/// Returns the generated join code
#[instrument(name = "create_lobby", skip(state))]
pub async fn create_lobby(
    State(state): State<AppState>,
) -> Result<Json<CreateLobbyResponse>, AppError> {
    let record = state.lobby_service.create_lobby().await?;

    info!(lobby_code = %record.state.code, "Lobby created");

    Ok(Json(CreateLobbyResponse {
        code: record.state.code,
    }))
}

/// HTTP handler for reading a lobby snapshot
///
/// GET /lobby/{code}
#[instrument(name = "get_lobby", skip(state))]
pub async fn get_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LobbySnapshotResponse>, AppError> {
    let record = state.lobby_service.get_lobby(&code).await?;

    Ok(Json(LobbySnapshotResponse {
        version: record.version,
        state: record.state,
    }))
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
