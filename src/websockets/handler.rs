use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::game::{GameError, LobbyManager};
use crate::lobby::models::normalize_lobby_code;
use crate::shared::{AppError, AppState};
use crate::websockets::messages::{ClientEnvelope, ServerMessage};

use super::socket::{Connection, MessageHandler, SocketWrapper};

/// Turns client messages into intents for the lobby's actor.
///
/// Outcomes of accepted intents arrive through the fanout as `state` or
/// `error` messages; only messages that never reach the actor are answered here.
pub struct GatewayMessageHandler {
    lobby_manager: Arc<LobbyManager>,
}

impl GatewayMessageHandler {
    pub fn new(lobby_manager: Arc<LobbyManager>) -> Self {
        Self { lobby_manager }
    }
}

#[async_trait]
impl MessageHandler for GatewayMessageHandler {
    async fn handle_message(
        &self,
        player_id: &str,
        lobby_code: &str,
        message: String,
    ) -> Option<ServerMessage> {
        debug!(
            player_id = %player_id,
            lobby_code = %lobby_code,
            message = %message,
            "Received message"
        );

        let result = match ClientEnvelope::parse(&message).and_then(|m| m.into_intent(player_id)) {
            Ok(intent) => self.lobby_manager.enqueue(lobby_code, intent).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    player_id = %player_id,
                    lobby_code = %lobby_code,
                    error = %e,
                    "Rejected client message"
                );
                Some(ServerMessage::error(&e))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    pub token: Option<String>,
}

/// Session token from the first `Sec-WebSocket-Protocol` entry, else `?token=`
fn extract_token(headers: &HeaderMap, query: &WebSocketQuery) -> Option<String> {
    headers
        .get("sec-websocket-protocol")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| query.token.clone().filter(|token| !token.is_empty()))
}

/// Who is connecting, and to which lobby
#[derive(Debug)]
struct Admission {
    lobby_code: String,
    player_id: String,
    token: String,
}

async fn admit(
    app_state: &AppState,
    code: &str,
    headers: &HeaderMap,
    query: &WebSocketQuery,
) -> Result<Admission, AppError> {
    let lobby_code = normalize_lobby_code(code)
        .ok_or_else(|| AppError::Game(GameError::LobbyNotFound(code.to_string())))?;

    let token = extract_token(headers, query).ok_or_else(|| {
        warn!("Missing session token");
        AppError::Unauthorized("Missing authentication token".to_string())
    })?;
    let claims = app_state.token_config.validate_token(&token)?;

    // Refuse the upgrade for lobbies that do not exist
    app_state.lobby_manager.snapshot(&lobby_code).await?;

    Ok(Admission {
        lobby_code,
        player_id: claims.player_id,
        token,
    })
}

/// WebSocket endpoint
/// GET /ws/{code} with the session token in Sec-WebSocket-Protocol or `?token=`
#[instrument(name = "websocket", skip(ws, headers, query, app_state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Query(query): Query<WebSocketQuery>,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    let Admission {
        lobby_code,
        player_id,
        token,
    } = admit(&app_state, &code, &headers, &query).await?;

    info!(
        lobby_code = %lobby_code,
        player_id = %player_id,
        "WebSocket authenticated"
    );

    // Echo the token back as the accepted subprotocol, browsers require it
    Ok(ws.protocols([token]).on_upgrade(move |socket| {
        handle_websocket_connection(Box::new(socket), lobby_code, player_id, app_state)
    }))
}

/// Runs a subscribed connection until it closes.
///
/// Disconnecting does not remove the player from the lobby; only an explicit
/// `leave` does.
pub async fn handle_websocket_connection(
    socket: Box<dyn SocketWrapper>,
    lobby_code: String,
    player_id: String,
    app_state: AppState,
) {
    let hub = app_state.fanout_hub.clone();
    let subscriber = hub.subscribe(&lobby_code, &player_id).await;
    let subscriber_id = subscriber.id;

    // Subscribe first so no commit between snapshot and subscription is missed
    match app_state.lobby_manager.snapshot(&lobby_code).await {
        Ok(record) => {
            hub.deliver_snapshot(&lobby_code, subscriber_id, record.version, &record.state)
                .await;
        }
        Err(e) => {
            warn!(lobby_code = %lobby_code, error = %e, "Lobby vanished before connect");
            hub.unsubscribe(&lobby_code, subscriber_id).await;
            return;
        }
    }

    let message_handler = Arc::new(GatewayMessageHandler::new(
        app_state.lobby_manager.clone(),
    ));
    let connection = Connection::new(subscriber, hub.clone(), socket, message_handler);

    match connection.run().await {
        Ok(()) => {
            info!(lobby_code = %lobby_code, player_id = %player_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(lobby_code = %lobby_code, player_id = %player_id, error = ?e, "WebSocket connection error");
        }
    }

    hub.unsubscribe(&lobby_code, subscriber_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;

    #[test]
    fn test_token_prefers_protocol_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "sec-websocket-protocol",
            HeaderValue::from_static("abc.def, other"),
        );
        let query = WebSocketQuery {
            token: Some("fallback".to_string()),
        };
        assert_eq!(extract_token(&headers, &query).as_deref(), Some("abc.def"));

        let empty = HeaderMap::new();
        assert_eq!(extract_token(&empty, &query).as_deref(), Some("fallback"));
        assert_eq!(
            extract_token(&empty, &WebSocketQuery { token: None }),
            None
        );
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("sec-websocket-protocol", HeaderValue::from_str(token).unwrap());
        headers
    }

    const NO_QUERY: WebSocketQuery = WebSocketQuery { token: None };

    #[tokio::test]
    async fn test_admit_binds_player_from_token() {
        let state = AppStateBuilder::new().build();
        let code = state.lobby_service.create_lobby().await.unwrap().state.code;
        let token = state.token_config.create_token("p1").unwrap();

        let admission = admit(&state, &code.to_lowercase(), &bearer(&token), &NO_QUERY)
            .await
            .unwrap();
        assert_eq!(admission.lobby_code, code);
        assert_eq!(admission.player_id, "p1");
        assert_eq!(admission.token, token);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let state = AppStateBuilder::new().build();
        let code = state.lobby_service.create_lobby().await.unwrap().state.code;

        let err = admit(&state, &code, &HeaderMap::new(), &NO_QUERY)
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let state = AppStateBuilder::new().build();
        let code = state.lobby_service.create_lobby().await.unwrap().state.code;

        let err = admit(&state, &code, &bearer("not-a-jwt"), &NO_QUERY)
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_lobby_is_not_found() {
        let state = AppStateBuilder::new().build();
        let token = state.token_config.create_token("p1").unwrap();

        let err = admit(&state, "ZZZZ", &bearer(&token), &NO_QUERY)
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gateway_rejects_malformed_and_foreign_messages() {
        let state = AppStateBuilder::new().build();
        let code = state.lobby_service.create_lobby().await.unwrap().state.code;
        let handler = GatewayMessageHandler::new(state.lobby_manager.clone());

        let reply = handler.handle_message("p1", &code, "garbage".to_string()).await;
        assert!(matches!(reply, Some(ServerMessage::Error { code, .. }) if code == crate::game::ErrorCode::InvalidMessage));

        let reply = handler
            .handle_message("p1", &code, r#"{"type": "leave", "playerId": "p2"}"#.to_string())
            .await;
        assert!(matches!(reply, Some(ServerMessage::Error { code, .. }) if code == crate::game::ErrorCode::Unauthorized));

        let reply = handler
            .handle_message("p1", &code, r#"{"type": "join", "name": "Alice"}"#.to_string())
            .await;
        assert!(reply.is_none());
    }
}
