use serde::{Deserialize, Serialize};

/// JWT claims binding a connection to a player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub player_id: String,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Body of `POST /session`. Both fields are optional; a returning client
/// sends the player id it stored locally to keep its identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub player_id: Option<String>,
    pub name: Option<String>,
}

/// Response structure for session creation endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub player_id: String,
    pub suggested_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_response_is_camel_case() {
        let response = SessionResponse {
            token: "jwt-token-here".to_string(),
            player_id: "player-1".to_string(),
            suggested_name: "happy-cat".to_string(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["token"], "jwt-token-here");
        assert_eq!(value["playerId"], "player-1");
        assert_eq!(value["suggestedName"], "happy-cat");
    }

    #[test]
    fn test_session_request_fields_are_optional() {
        let empty: SessionRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.player_id.is_none());
        assert!(empty.name.is_none());

        let full: SessionRequest =
            serde_json::from_str(r#"{"playerId": "abc", "name": "Alice"}"#).unwrap();
        assert_eq!(full.player_id.as_deref(), Some("abc"));
        assert_eq!(full.name.as_deref(), Some("Alice"));
    }
}
