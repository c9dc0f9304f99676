use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::api::server::{JsonResult, RouteError};
use crate::codes::expiry::{Expiration, format_in_timezone, get_expiration_status};
use crate::games::Game;
use crate::poller;
use crate::state::AppState;
use crate::store::{Config, ConfigError, WebhookEntry};

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Applies `change` to a copy of the config, persists the copy, and only then swaps it in, so a
/// rejected change or a failed save leaves the running config untouched
async fn mutate_config<T, F>(state: &AppState, change: F) -> Result<T, RouteError>
where
    F: FnOnce(&mut Config) -> Result<T, ConfigError>,
{
    let mut guard = state.config.write().await;
    let mut updated = guard.clone();

    let out = change(&mut updated)?;
    state.store.save_config(&updated).await?;
    *guard = updated;

    Ok(out)
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub webhooks: Vec<WebhookEntry>,
    pub check_interval: u64,
    pub timezone: String,

    /// `<game_key, display_name>`
    pub games: BTreeMap<&'static str, &'static str>,
}

#[instrument(skip(state))]
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigView> {
    let config = state.config_snapshot().await;

    Json(ConfigView {
        webhooks: config.webhooks,
        check_interval: config.check_interval,
        timezone: config.timezone,
        games: Game::ALL
            .iter()
            .map(|game| (game.key(), game.display_name()))
            .collect(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdate {
    pub webhooks: Option<Value>,
    pub check_interval: Option<i64>,
    pub timezone: Option<String>,
}

#[instrument(skip(state, update))]
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> JsonResult<ActionResponse> {
    let timezone_accepted = mutate_config(&state, |config| {
        if let Some(webhooks) = update.webhooks {
            config.replace_webhooks(webhooks)?;
        }

        if let Some(secs) = update.check_interval {
            config.set_check_interval(secs);
        }

        Ok(update
            .timezone
            .as_deref()
            .map(|tz| config.set_timezone(tz))
            .unwrap_or(true))
    })
    .await?;

    if timezone_accepted {
        Ok(ActionResponse::ok("Configuration saved"))
    } else {
        tracing::warn!("ignored invalid timezone in config update");
        Ok(ActionResponse::ok(
            "Configuration saved (invalid timezone ignored)",
        ))
    }
}

#[instrument(skip(state))]
pub async fn list_webhooks(State(state): State<Arc<AppState>>) -> Json<Vec<WebhookEntry>> {
    Json(state.config.read().await.webhooks.clone())
}

#[derive(Debug, Deserialize)]
pub struct WebhookInput {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub games: BTreeMap<String, bool>,
}

impl WebhookInput {
    fn into_entry(self, fallback_name: String) -> WebhookEntry {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(fallback_name);

        WebhookEntry::new(name, self.url, self.games)
    }
}

#[instrument(skip(state, input))]
pub async fn add_webhook(
    State(state): State<Arc<AppState>>,
    Json(input): Json<WebhookInput>,
) -> JsonResult<ActionResponse> {
    let count = mutate_config(&state, |config| {
        let entry = input.into_entry(format!("Webhook {}", config.webhooks.len() + 1));
        config.add_webhook(entry)?;
        Ok(config.webhooks.len())
    })
    .await?;

    tracing::info!(count, "webhook added");
    Ok(ActionResponse::ok("Webhook added"))
}

#[instrument(skip(state, input))]
pub async fn update_webhook(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(input): Json<WebhookInput>,
) -> JsonResult<ActionResponse> {
    mutate_config(&state, |config| {
        let fallback = config
            .webhooks
            .get(index)
            .map(|hook| hook.name.clone())
            .ok_or(ConfigError::NotFound(index))?;

        config.update_webhook(index, input.into_entry(fallback))
    })
    .await?;

    Ok(ActionResponse::ok("Webhook updated"))
}

#[instrument(skip(state))]
pub async fn delete_webhook(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> JsonResult<ActionResponse> {
    let removed = mutate_config(&state, |config| config.remove_webhook(index)).await?;
    Ok(ActionResponse::ok(format!("Webhook '{}' deleted", removed.name)))
}

#[instrument(skip(state))]
pub async fn check_now(State(state): State<Arc<AppState>>) -> Json<ActionResponse> {
    poller::trigger(state);
    ActionResponse::ok("Check triggered")
}

#[derive(Debug, Default, Deserialize)]
pub struct TestWebhookRequest {
    pub index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TestWebhookResponse {
    pub success: bool,
    pub results: Vec<TestResult>,
}

#[instrument(skip(state, req))]
pub async fn test_webhook(
    State(state): State<Arc<AppState>>,
    req: Option<Json<TestWebhookRequest>>,
) -> JsonResult<TestWebhookResponse> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let webhooks = state.config.read().await.webhooks.clone();

    let targets = match req.index {
        Some(index) => vec![
            webhooks
                .get(index)
                .cloned()
                .ok_or_else(|| RouteError::NotFound(format!("no webhook at index {index}")))?,
        ],
        None => webhooks,
    };

    if targets.is_empty() {
        return Err(RouteError::InvalidInput(
            "no webhooks configured".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(targets.len());
    for hook in targets {
        let result = state.notifier.send_test(&hook.name, &hook.url).await;
        results.push(TestResult {
            name: hook.name,
            success: result.is_ok(),
            message: match result {
                Ok(()) => "Test notification sent".to_string(),
                Err(e) => e.to_string(),
            },
        });
    }

    Ok(Json(TestWebhookResponse {
        success: results.iter().all(|r| r.success),
        results,
    }))
}

#[derive(Debug, Serialize)]
pub struct CodeStatus {
    pub code: String,
    pub expires: Option<String>,
    pub expires_display: Option<String>,
    #[serde(flatten)]
    pub expiration: Expiration,
}

#[derive(Debug, Serialize)]
pub struct GameStatus {
    pub name: String,
    pub codes: Vec<CodeStatus>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub checker_running: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub timezone: String,
    pub games: BTreeMap<String, GameStatus>,
}

#[instrument(skip(state))]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timezone = state.config.read().await.timezone.clone();
    let last_check = *state.last_check.read().await;
    let now = Utc::now();

    let history = state.history.lock().await;
    let games = Game::ALL
        .iter()
        .map(|&game| {
            let codes = history
                .codes(game)
                .iter()
                .map(|code| {
                    let expires = history.expiration(game, code);

                    CodeStatus {
                        code: code.clone(),
                        expires: expires.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
                        expires_display: expires.map(|dt| format_in_timezone(dt, &timezone)),
                        expiration: get_expiration_status(expires, now),
                    }
                })
                .collect();

            (
                game.key().to_string(),
                GameStatus {
                    name: game.display_name().to_string(),
                    codes,
                },
            )
        })
        .collect();
    drop(history);

    Json(StatusResponse {
        checker_running: state.poller_running(),
        last_check,
        timezone,
        games,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    pub game: Option<String>,
}

#[instrument(skip(state, req))]
pub async fn clear_codes(
    State(state): State<Arc<AppState>>,
    req: Option<Json<ClearRequest>>,
) -> JsonResult<ActionResponse> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let game = match req.game.as_deref() {
        None | Some("") => None,
        Some(key) => Some(Game::try_from(key).map_err(RouteError::InvalidInput)?),
    };

    let mut history = state.history.lock().await;
    let mut cleared = history.clone();
    cleared.clear(game);
    state.store.save_history(&cleared).await?;
    *history = cleared;

    tracing::info!(game = ?game, "sent code history cleared");
    Ok(ActionResponse::ok("Codes cleared"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::server::router;
    use crate::poller::test::{genshin_only, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn send(
        state: Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_config_update_and_validation() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server, &dir, Vec::new()).await;

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/config",
            Some(json!({ "check_interval": 10, "timezone": "Asia/Tokyo" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send(state.clone(), "GET", "/api/config", None).await;
        assert_eq!(body["check_interval"], 60);
        assert_eq!(body["timezone"], "Asia/Tokyo");
        assert_eq!(body["games"]["starrail"], "Honkai: Star Rail");

        // bad timezone is ignored, the rest still applies
        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/config",
            Some(json!({ "check_interval": 600, "timezone": "Nowhere/Land" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let config = state.config_snapshot().await;
        assert_eq!(config.timezone, "Asia/Tokyo");
        assert_eq!(config.check_interval, 600);

        // non-list webhooks are rejected wholesale
        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/config",
            Some(json!({ "webhooks": "https://a.test", "check_interval": 900 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.config_snapshot().await.check_interval, 600);

        let persisted = state.store.load_config().await;
        assert_eq!(persisted, state.config_snapshot().await);
    }

    #[tokio::test]
    async fn test_webhook_crud() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server, &dir, Vec::new()).await;

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/webhooks",
            Some(json!({ "name": "main", "url": "https://a.test/hook" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/webhooks",
            Some(json!({ "url": "https://a.test/hook" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            state.clone(),
            "PUT",
            "/api/webhooks/0",
            Some(json!({ "url": "https://b.test/hook", "games": { "zenless": false } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(state.clone(), "GET", "/api/webhooks", None).await;
        assert_eq!(body[0]["name"], "main");
        assert_eq!(body[0]["url"], "https://b.test/hook");
        assert_eq!(body[0]["games"]["zenless"], false);
        assert_eq!(body[0]["games"]["genshin"], true);

        let (status, _) = send(state.clone(), "DELETE", "/api/webhooks/3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(state.clone(), "DELETE", "/api/webhooks/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.config_snapshot().await.webhooks.is_empty());
    }

    #[tokio::test]
    async fn test_webhook_test_route() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/good"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(
            &server,
            &dir,
            vec![
                genshin_only("good", format!("{}/good", server.uri())),
                genshin_only("bad", format!("{}/bad", server.uri())),
            ],
        )
        .await;

        let (_, body) = send(
            state.clone(),
            "POST",
            "/api/test-webhook",
            Some(json!({ "index": 0 })),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);

        let (_, body) = send(state.clone(), "POST", "/api/test-webhook", None).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["results"][1]["success"], false);
        assert!(body["results"][1]["message"].as_str().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_status_and_clear() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server, &dir, Vec::new()).await;

        let soon = Utc::now() + chrono::Duration::hours(60);
        {
            let mut history = state.history.lock().await;
            history.record(Game::Genshin, "SOON", Some(soon));
            history.record(Game::StarRail, "NOEXP", None);
        }

        let (_, body) = send(state.clone(), "GET", "/api/status", None).await;
        assert_eq!(body["checker_running"], false);
        assert_eq!(body["games"]["genshin"]["codes"][0]["code"], "SOON");
        assert_eq!(body["games"]["genshin"]["codes"][0]["urgency"], "soon");
        assert_eq!(body["games"]["genshin"]["codes"][0]["status"], "active");
        assert_eq!(body["games"]["starrail"]["codes"][0]["status"], "unknown");

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/clear-codes",
            Some(json!({ "game": "atlantis" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/clear-codes",
            Some(json!({ "game": "genshin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        {
            let history = state.history.lock().await;
            assert!(history.codes(Game::Genshin).is_empty());
            assert_eq!(history.codes(Game::StarRail), ["NOEXP"]);
        }

        let (status, _) = send(state.clone(), "POST", "/api/clear-codes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.history.lock().await.codes(Game::StarRail).is_empty());
        assert!(state.store.load_history().await.codes(Game::StarRail).is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server, &dir, Vec::new()).await;

        let request = Request::builder()
            .uri("/checkhealth")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
