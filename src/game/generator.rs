use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::lobby::models::CreativityMode;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("option generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("option generator request failed: {0}")]
    Request(String),

    #[error("option generator returned an error: {0}")]
    Service(String),

    #[error("expected {expected} options, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("duplicate option: {0}")]
    Duplicate(String),
}

/// Produces one category option per player for a prompt.
///
/// Implementations return exactly `player_count` distinct non-empty options
/// or fail; they never retry on their own.
#[async_trait]
pub trait OptionGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        player_count: usize,
        creativity: CreativityMode,
    ) -> Result<Vec<String>, GenerationError>;
}

/// Trims options and checks count, emptiness and uniqueness
pub fn validate_options(
    options: Vec<String>,
    expected: usize,
) -> Result<Vec<String>, GenerationError> {
    if options.len() != expected {
        return Err(GenerationError::WrongCount {
            expected,
            actual: options.len(),
        });
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(options.len());
    for (idx, option) in options.into_iter().enumerate() {
        let option = option.trim().to_string();
        if option.is_empty() {
            return Err(GenerationError::EmptyOption(idx));
        }
        if !seen.insert(option.to_lowercase()) {
            return Err(GenerationError::Duplicate(option));
        }
        cleaned.push(option);
    }
    Ok(cleaned)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: &'a str,
    player_count: usize,
    creativity: CreativityMode,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OptionList {
    List(Vec<String>),
    /// Raw model output, e.g. "apple, banana, cherry"
    Csv(String),
}

impl OptionList {
    fn into_vec(self) -> Vec<String> {
        match self {
            OptionList::List(options) => options,
            OptionList::Csv(raw) => raw.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    options: Option<OptionList>,
    #[serde(default)]
    error: Option<String>,
}

/// Calls an external text-generation service over HTTP
pub struct HttpOptionGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpOptionGenerator {
    pub fn new(
        url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl OptionGenerator for HttpOptionGenerator {
    #[instrument(skip(self))]
    async fn generate(
        &self,
        prompt: &str,
        player_count: usize,
        creativity: CreativityMode,
    ) -> Result<Vec<String>, GenerationError> {
        let body = GenerateRequest {
            prompt,
            player_count,
            creativity,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Request("request timed out".to_string())
            } else {
                GenerationError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let parsed = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GenerationError::Request(format!("invalid response body: {e}")));

        if status != StatusCode::OK {
            let message = parsed
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("http {}", status.as_u16()));
            warn!(status = status.as_u16(), error = %message, "Option generator failed");
            return Err(GenerationError::Service(message));
        }

        let parsed = parsed?;
        let options = match (parsed.options, parsed.error) {
            (Some(options), _) => options.into_vec(),
            (None, Some(error)) => return Err(GenerationError::Service(error)),
            (None, None) => {
                return Err(GenerationError::Request(
                    "response has no options".to_string(),
                ))
            }
        };

        debug!(count = options.len(), "Option generator responded");
        validate_options(options, player_count)
    }
}

/// Offline generator that numbers the prompt, e.g. "fruits #1".
///
/// Used when no generation service is configured.
pub struct PlaceholderOptionGenerator;

#[async_trait]
impl OptionGenerator for PlaceholderOptionGenerator {
    async fn generate(
        &self,
        prompt: &str,
        player_count: usize,
        _creativity: CreativityMode,
    ) -> Result<Vec<String>, GenerationError> {
        Ok((1..=player_count).map(|i| format!("{prompt} #{i}")).collect())
    }
}
