use axum::{extract::State, Json};
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{SessionRequest, SessionResponse};
use crate::shared::{AppError, AppState};

const MAX_PLAYER_ID_LEN: usize = 64;

/// HTTP handler for creating a new session
///
/// POST /session
/// Returns a signed token bound to a player id and a suggested display name.
/// A returning client may send its stored `playerId` to keep it.
#[instrument(name = "create_session", skip(state, body))]
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<SessionRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let player_id = match request.player_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() && id.len() <= MAX_PLAYER_ID_LEN => id,
        Some(_) => {
            return Err(AppError::BadRequest(format!(
                "playerId must be 1-{MAX_PLAYER_ID_LEN} characters"
            )))
        }
        None => Uuid::new_v4().to_string(),
    };

    let suggested_name = request
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| state.name_suggester.suggest());

    let token = state.token_config.create_token(&player_id)?;

    info!(
        player_id = %player_id,
        suggested_name = %suggested_name,
        "Session created successfully"
    );

    Ok(Json(SessionResponse {
        token,
        player_id,
        suggested_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/session", axum::routing::post(create_session))
            .with_state(state)
    }

    async fn read_session(response: axum::response::Response) -> SessionResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_create_session_without_body() {
        let state = AppStateBuilder::new().build();
        let token_config = state.token_config.clone();

        let request = Request::builder()
            .method("POST")
            .uri("/session")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = read_session(response).await;
        assert!(Uuid::parse_str(&session.player_id).is_ok());
        assert!(session.suggested_name.contains('-')); // Pet names have dashes

        let claims = token_config.validate_token(&session.token).unwrap();
        assert_eq!(claims.player_id, session.player_id);
    }

    #[tokio::test]
    async fn test_create_session_keeps_stored_player_id() {
        let state = AppStateBuilder::new().build();

        let request = Request::builder()
            .method("POST")
            .uri("/session")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"playerId": "stored-id", "name": "Alice"}"#))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = read_session(response).await;
        assert_eq!(session.player_id, "stored-id");
        assert_eq!(session.suggested_name, "Alice");
    }

    #[tokio::test]
    async fn test_create_session_rejects_blank_player_id() {
        let state = AppStateBuilder::new().build();

        let request = Request::builder()
            .method("POST")
            .uri("/session")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"playerId": "   "}"#))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
