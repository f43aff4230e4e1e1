use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};

use super::types::SessionClaims;
use crate::shared::AppError;

pub const DEFAULT_EXPIRATION_DAYS: i64 = 365;

/// Configuration for JWT token operations
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    pub expiration_days: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, expiration_days: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration_days,
        }
    }

    /// Creates a signed token for `player_id`
    #[instrument(skip(self))]
    pub fn create_token(&self, player_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::days(self.expiration_days)).timestamp() as usize;

        debug!(
            expiration_days = self.expiration_days,
            exp_timestamp = exp,
            "Creating JWT token with expiration"
        );

        let claims = SessionClaims {
            player_id: player_id.to_string(),
            exp,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })
    }

    /// Validates a JWT token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                player_id = %data.claims.player_id,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::Unauthorized(format!("Invalid session token: {e}"))
        })
    }
}
