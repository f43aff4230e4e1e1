use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::models::{LobbyRecord, LobbyState};

/// Errors surfaced by lobby storage backends
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Lobby code already taken: {0}")]
    CodeTaken(String),

    #[error("Lobby not found: {0}")]
    NotFound(String),

    #[error("Version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable map of lobby code -> lobby state with optimistic concurrency.
///
/// Every successful write bumps the record's version by one. Writers that
/// raced each other find out through `Conflict` and reload.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    async fn create(&self, code: &str, state: &LobbyState) -> Result<LobbyRecord, StoreError>;

    async fn get(&self, code: &str) -> Result<LobbyRecord, StoreError>;

    /// Replaces the stored state only if the stored version equals `expected_version`
    async fn compare_and_set(
        &self,
        code: &str,
        expected_version: u64,
        state: &LobbyState,
    ) -> Result<LobbyRecord, StoreError>;

    async fn delete(&self, code: &str) -> Result<(), StoreError>;

    /// Codes of lobbies whose last write is older than `threshold`
    async fn list_idle(&self, threshold: Duration) -> Result<Vec<String>, StoreError>;
}

fn idle_cutoff(threshold: Duration) -> DateTime<Utc> {
    let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(threshold)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// In-memory implementation of LobbyStore for development and testing
pub struct InMemoryLobbyStore {
    lobbies: Mutex<HashMap<String, LobbyRecord>>,
}

impl Default for InMemoryLobbyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLobbyStore {
    /// Creates a new empty in-memory store
    pub fn new() -> Self {
        Self {
            lobbies: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrites the activity timestamp of a lobby (used to age lobbies in tests)
    pub fn set_last_activity(&self, code: &str, at: DateTime<Utc>) {
        let mut lobbies = self.lobbies.lock().unwrap();
        if let Some(record) = lobbies.get_mut(&code.to_ascii_uppercase()) {
            record.last_activity_at = at;
        }
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.lock().unwrap().len()
    }
}

#[async_trait]
impl LobbyStore for InMemoryLobbyStore {
    #[instrument(skip(self, state))]
    async fn create(&self, code: &str, state: &LobbyState) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        debug!(lobby_code = %code, "Creating lobby in memory");

        let mut lobbies = self.lobbies.lock().unwrap();
        if lobbies.contains_key(&code) {
            warn!(lobby_code = %code, "Lobby code already exists in memory");
            return Err(StoreError::CodeTaken(code));
        }

        let record = LobbyRecord::new(state.clone());
        lobbies.insert(code, record.clone());
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get(&self, code: &str) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        let lobbies = self.lobbies.lock().unwrap();
        lobbies
            .get(&code)
            .cloned()
            .ok_or(StoreError::NotFound(code))
    }

    #[instrument(skip(self, state))]
    async fn compare_and_set(
        &self,
        code: &str,
        expected_version: u64,
        state: &LobbyState,
    ) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        let mut lobbies = self.lobbies.lock().unwrap();

        let record = lobbies
            .get_mut(&code)
            .ok_or_else(|| StoreError::NotFound(code.clone()))?;

        if record.version != expected_version {
            debug!(
                lobby_code = %code,
                expected = expected_version,
                actual = record.version,
                "CAS conflict in memory"
            );
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: record.version,
            });
        }

        record.state = state.clone();
        record.version += 1;
        record.last_activity_at = Utc::now();

        debug!(lobby_code = %code, version = record.version, "Lobby committed in memory");
        Ok(record.clone())
    }

    #[instrument(skip(self))]
    async fn delete(&self, code: &str) -> Result<(), StoreError> {
        let code = code.to_ascii_uppercase();
        let mut lobbies = self.lobbies.lock().unwrap();
        if lobbies.remove(&code).is_none() {
            return Err(StoreError::NotFound(code));
        }
        info!(lobby_code = %code, "Lobby deleted from memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_idle(&self, threshold: Duration) -> Result<Vec<String>, StoreError> {
        let cutoff = idle_cutoff(threshold);
        let lobbies = self.lobbies.lock().unwrap();
        Ok(lobbies
            .iter()
            .filter(|(_, record)| record.last_activity_at < cutoff)
            .map(|(code, _)| code.clone())
            .collect())
    }
}

/// PostgreSQL implementation of LobbyStore. State is kept as JSONB.
pub struct PostgresLobbyStore {
    pool: PgPool,
}

impl PostgresLobbyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the lobbies table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS lobbies (
                code TEXT PRIMARY KEY,
                state JSONB NOT NULL,
                version BIGINT NOT NULL,
                last_activity_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    warn!(error = %e, "Lobby database error");
    StoreError::Unavailable(e.to_string())
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<LobbyRecord, StoreError> {
    let Json(state): Json<LobbyState> = row.try_get("state").map_err(unavailable)?;
    let version: i64 = row.try_get("version").map_err(unavailable)?;
    let last_activity_at: DateTime<Utc> = row.try_get("last_activity_at").map_err(unavailable)?;
    Ok(LobbyRecord {
        state,
        version: version as u64,
        last_activity_at,
    })
}

#[async_trait]
impl LobbyStore for PostgresLobbyStore {
    #[instrument(skip(self, state))]
    async fn create(&self, code: &str, state: &LobbyState) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        let record = LobbyRecord::new(state.clone());

        let result = sqlx::query(
            "INSERT INTO lobbies (code, state, version, last_activity_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&code)
        .bind(Json(&record.state))
        .bind(record.version as i64)
        .bind(record.last_activity_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(lobby_code = %code, "Lobby created in database");
                Ok(record)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::CodeTaken(code))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, code: &str) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        let row = sqlx::query("SELECT state, version, last_activity_at FROM lobbies WHERE code = $1")
            .bind(&code)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StoreError::NotFound(code)),
        }
    }

    #[instrument(skip(self, state))]
    async fn compare_and_set(
        &self,
        code: &str,
        expected_version: u64,
        state: &LobbyState,
    ) -> Result<LobbyRecord, StoreError> {
        let code = code.to_ascii_uppercase();
        let row = sqlx::query(
            "UPDATE lobbies SET state = $3, version = version + 1, last_activity_at = $4
             WHERE code = $1 AND version = $2
             RETURNING state, version, last_activity_at",
        )
        .bind(&code)
        .bind(expected_version as i64)
        .bind(Json(state))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(row) => record_from_row(&row),
            None => {
                // Either the lobby is gone or somebody else won the race
                let current = self.get(&code).await?;
                Err(StoreError::Conflict {
                    expected: expected_version,
                    actual: current.version,
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, code: &str) -> Result<(), StoreError> {
        let code = code.to_ascii_uppercase();
        let result = sqlx::query("DELETE FROM lobbies WHERE code = $1")
            .bind(&code)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(code));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_idle(&self, threshold: Duration) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT code FROM lobbies WHERE last_activity_at < $1")
            .bind(idle_cutoff(threshold))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("code").map_err(unavailable))
            .collect()
    }
}
