use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::lobby::models::Phase;
use crate::lobby::repository::StoreError;

/// Machine-readable error codes sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    LobbyNotFound,
    LobbyFull,
    NameTaken,
    NotYourTurn,
    WrongPhase,
    InvalidSubmission,
    GenerationFailed,
    Internal,
    NotHost,
    NotEnoughPlayers,
    NotInLobby,
    InvalidName,
    InvalidMessage,
    Unauthorized,
}

/// Reasons an intent is refused. State is unchanged whenever one of these is returned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GameError {
    #[error("Lobby not found: {0}")]
    LobbyNotFound(String),

    #[error("Lobby is full")]
    LobbyFull,

    #[error("Name already taken: {0}")]
    NameTaken(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Only the host can do that")]
    NotHost,

    #[error("At least {0} players are needed")]
    NotEnoughPlayers(usize),

    #[error("Player is not in this lobby: {0}")]
    NotInLobby(String),

    #[error("Not allowed during the {0} phase")]
    WrongPhase(Phase),

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Option generation failed: {0}")]
    GenerationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::LobbyNotFound(_) => ErrorCode::LobbyNotFound,
            GameError::LobbyFull => ErrorCode::LobbyFull,
            GameError::NameTaken(_) => ErrorCode::NameTaken,
            GameError::InvalidName(_) => ErrorCode::InvalidName,
            GameError::NotYourTurn => ErrorCode::NotYourTurn,
            GameError::NotHost => ErrorCode::NotHost,
            GameError::NotEnoughPlayers(_) => ErrorCode::NotEnoughPlayers,
            GameError::NotInLobby(_) => ErrorCode::NotInLobby,
            GameError::WrongPhase(_) => ErrorCode::WrongPhase,
            GameError::InvalidSubmission(_) => ErrorCode::InvalidSubmission,
            GameError::InvalidMessage(_) => ErrorCode::InvalidMessage,
            GameError::GenerationFailed(_) => ErrorCode::GenerationFailed,
            GameError::Unauthorized(_) => ErrorCode::Unauthorized,
            GameError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(code) => GameError::LobbyNotFound(code),
            other => GameError::Internal(other.to_string()),
        }
    }
}
