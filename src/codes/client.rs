use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use super::CodeRecord;
use crate::constants::SOURCE_TIMEOUT;
use crate::games::Game;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("non-success response: {0}")]
    Status(reqwest::StatusCode),

    #[error("response body is not json: {0}")]
    Body(#[from] serde_json::Error),

    #[error("'active' field is missing or not an array")]
    Shape,
}

pub type SourceResult<T> = core::result::Result<T, SourceError>;

/// Client for the per-game "active codes" endpoints
#[derive(Debug, Clone)]
pub struct CodeSource {
    client: Client,
    api_base: String,
}

impl CodeSource {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    /// Fetches the currently active codes for `game`.
    ///
    /// Never fails: any transport error, bad status or unexpected body is logged and reported as
    /// "no codes this cycle".
    #[instrument(skip(self))]
    pub async fn fetch_codes(&self, game: Game) -> Vec<CodeRecord> {
        match self.try_fetch(game).await {
            Ok(codes) => {
                tracing::debug!(count = codes.len(), "fetched active codes");
                codes
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch codes");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, game: Game) -> SourceResult<Vec<CodeRecord>> {
        let res = self
            .client
            .get(game.source_url(&self.api_base))
            .timeout(SOURCE_TIMEOUT)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(SourceError::Status(res.status()));
        }

        let body = res.bytes().await?;
        let data: Value = serde_json::from_slice(&body)?;

        match data.get("active") {
            Some(Value::Array(items)) => Ok(items.iter().cloned().map(CodeRecord).collect()),
            _ => Err(SourceError::Shape),
        }
    }
}
