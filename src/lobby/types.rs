use serde::{Deserialize, Serialize};

use super::models::LobbyState;

/// Response of `POST /lobby`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateLobbyResponse {
    pub code: String,
}

/// Response of `GET /lobby/{code}`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LobbySnapshotResponse {
    pub version: u64,
    pub state: LobbyState,
}
