pub mod embed;

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::codes::CodeRecord;
use crate::codes::expiry::parse_expiration;
use crate::constants::{BETWEEN_POSTS_DELAY, STATS_TIMEOUT, WEBHOOK_TIMEOUT};
use crate::games::Game;
use crate::store::Config;
use embed::WebhookPayload;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("webhook returned {0}")]
    Status(StatusCode),
}

pub type NotifyResult<T> = core::result::Result<T, NotifyError>;

/// Discovery record sent to the statistics endpoint
#[derive(Debug, Clone, Serialize)]
struct DiscoveryReport<'a> {
    game: &'a str,
    code: &'a str,
    rewards: Option<String>,
    expires: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    stats_url: Option<String>,
    avatar_base: Option<String>,
    post_delay: Duration,
}

impl Notifier {
    pub fn new(client: Client, stats_url: Option<String>, avatar_base: Option<String>) -> Self {
        Self {
            client,
            stats_url,
            avatar_base,
            post_delay: BETWEEN_POSTS_DELAY,
        }
    }

    /// Overrides the pause between posts to different webhooks in one batch
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    /// Announces `record` on every webhook that has `game` enabled.
    ///
    /// Returns `true` if at least one webhook accepted the message. Individual failures are logged
    /// and do not stop the remaining posts.
    #[instrument(skip(self, record, config), fields(code = record.code()))]
    pub async fn send_notification(&self, game: Game, record: &CodeRecord, config: &Config) -> bool {
        let urls: Vec<&str> = config
            .enabled_webhooks(game)
            .into_iter()
            .map(|hook| hook.url.as_str())
            .collect();

        if urls.is_empty() {
            tracing::warn!("no webhooks enabled for game");
            return false;
        }

        let payload = embed::code_announcement(
            game,
            record,
            Utc::now(),
            &config.timezone,
            self.avatar_base.as_deref(),
        );

        let mut delivered = 0usize;
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !self.post_delay.is_zero() {
                tokio::time::sleep(self.post_delay).await;
            }

            match self.post(url, &payload).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(error = %e, webhook = i, "failed to deliver notification"),
            }
        }

        tracing::info!(delivered, targeted = urls.len(), "notification batch complete");
        if delivered == 0 {
            return false;
        }

        self.report_discovery(game, record).await;
        true
    }

    /// Sends a fixed test message to a single webhook
    #[instrument(skip(self, url))]
    pub async fn send_test(&self, name: &str, url: &str) -> NotifyResult<()> {
        self.post(url, &embed::test_message(name, Utc::now())).await
    }

    async fn post(&self, url: &str, payload: &WebhookPayload) -> NotifyResult<()> {
        let res = self
            .client
            .post(url)
            .json(payload)
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await?;

        match res.status() {
            status if status.is_success() => Ok(()),
            status => Err(NotifyError::Status(status)),
        }
    }

    /// Best-effort report to the statistics endpoint; never affects the notification outcome
    async fn report_discovery(&self, game: Game, record: &CodeRecord) {
        let Some(stats_url) = self.stats_url.as_deref() else {
            return;
        };

        let report = DiscoveryReport {
            game: game.key(),
            code: record.code(),
            rewards: record.reward_summary(),
            expires: parse_expiration(record)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        };

        let result = self
            .client
            .post(stats_url)
            .json(&report)
            .timeout(STATS_TIMEOUT)
            .send()
            .await
            .and_then(|res| res.error_for_status());

        match result {
            Ok(_) => tracing::debug!("discovery reported"),
            Err(e) => tracing::warn!(error = %e, "failed to report discovery"),
        }
    }
}
