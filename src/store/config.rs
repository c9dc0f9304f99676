use std::collections::BTreeMap;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEZONE, MIN_CHECK_INTERVAL};
use crate::games::Game;

const LEGACY_WEBHOOK_NAME: &str = "Default";
const LEGACY_KEYS: [&str; 2] = ["webhook_url", "games"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("a webhook with url '{0}' already exists")]
    DuplicateUrl(String),

    #[error("webhook url must not be empty")]
    EmptyUrl,

    #[error("no webhook at index {0}")]
    NotFound(usize),

    #[error("invalid webhook list: {0}")]
    InvalidWebhooks(String),
}

pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// A single notification destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub name: String,
    pub url: String,

    /// `<game_key, enabled>`
    #[serde(default)]
    pub games: BTreeMap<String, bool>,
}

impl WebhookEntry {
    /// Builds an entry, enabling every game not explicitly mentioned in `games`
    pub fn new(name: impl Into<String>, url: impl Into<String>, games: BTreeMap<String, bool>) -> Self {
        let mut entry = Self {
            name: name.into(),
            url: url.into().trim().to_string(),
            games,
        };

        entry.fill_missing_games();
        entry
    }

    pub fn is_enabled(&self, game: Game) -> bool {
        self.games.get(game.key()).copied().unwrap_or(false)
    }

    fn fill_missing_games(&mut self) {
        for game in Game::ALL {
            self.games.entry(game.key().to_string()).or_insert(true);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub webhooks: Vec<WebhookEntry>,
    pub check_interval: u64,
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhooks: Vec::new(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Config {
    /// Builds a config from a stored document.
    ///
    /// Returns the config and whether the document was in the legacy single-webhook shape (in
    /// which case the caller should write the migrated form back).
    pub fn from_document(mut doc: Value) -> Result<(Self, bool), serde_json::Error> {
        let migrated = migrate_legacy(&mut doc);
        let mut config: Config = serde_json::from_value(doc)?;

        config.check_interval = config.check_interval.max(MIN_CHECK_INTERVAL);
        if config.timezone.parse::<Tz>().is_err() {
            tracing::warn!(timezone = %config.timezone, "stored timezone is invalid, using default");
            config.timezone = DEFAULT_TIMEZONE.to_string();
        }

        config.webhooks.iter_mut().for_each(WebhookEntry::fill_missing_games);
        Ok((config, migrated))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.max(MIN_CHECK_INTERVAL))
    }

    pub fn set_check_interval(&mut self, secs: i64) {
        self.check_interval = (secs.max(0) as u64).max(MIN_CHECK_INTERVAL);
    }

    /// Applies `name` if it is a known IANA zone, returning whether it was accepted
    pub fn set_timezone(&mut self, name: &str) -> bool {
        match name.trim().parse::<Tz>() {
            Ok(tz) => {
                self.timezone = tz.name().to_string();
                true
            }
            Err(_) => false,
        }
    }

    pub fn enabled_webhooks(&self, game: Game) -> Vec<&WebhookEntry> {
        self.webhooks
            .iter()
            .filter(|hook| !hook.url.is_empty() && hook.is_enabled(game))
            .collect()
    }

    pub fn has_enabled_webhook(&self, game: Game) -> bool {
        !self.enabled_webhooks(game).is_empty()
    }

    pub fn add_webhook(&mut self, entry: WebhookEntry) -> ConfigResult<()> {
        self.check_url(&entry.url, None)?;
        self.webhooks.push(entry);
        Ok(())
    }

    pub fn update_webhook(&mut self, index: usize, entry: WebhookEntry) -> ConfigResult<()> {
        if index >= self.webhooks.len() {
            return Err(ConfigError::NotFound(index));
        }

        self.check_url(&entry.url, Some(index))?;
        self.webhooks[index] = entry;
        Ok(())
    }

    pub fn remove_webhook(&mut self, index: usize) -> ConfigResult<WebhookEntry> {
        if index >= self.webhooks.len() {
            return Err(ConfigError::NotFound(index));
        }

        Ok(self.webhooks.remove(index))
    }

    /// Replaces the whole webhook list; the current list is kept if `value` is not a valid list
    pub fn replace_webhooks(&mut self, value: Value) -> ConfigResult<()> {
        let Value::Array(items) = value else {
            return Err(ConfigError::InvalidWebhooks("expected an array".to_string()));
        };

        let mut replacement = Config {
            webhooks: Vec::with_capacity(items.len()),
            ..Config::default()
        };

        for item in items {
            let entry: WebhookEntry = serde_json::from_value(item)
                .map_err(|e| ConfigError::InvalidWebhooks(e.to_string()))?;
            replacement.add_webhook(WebhookEntry::new(entry.name, entry.url, entry.games))?;
        }

        self.webhooks = replacement.webhooks;
        Ok(())
    }

    fn check_url(&self, url: &str, skip: Option<usize>) -> ConfigResult<()> {
        if url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        let taken = self
            .webhooks
            .iter()
            .enumerate()
            .any(|(i, hook)| Some(i) != skip && hook.url == url);

        if taken {
            Err(ConfigError::DuplicateUrl(url.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Rewrites the single-webhook document shape into the webhook list shape in place
fn migrate_legacy(doc: &mut Value) -> bool {
    let Some(map) = doc.as_object_mut() else {
        return false;
    };

    if !LEGACY_KEYS.iter().any(|key| map.contains_key(*key)) {
        return false;
    }

    let url = map
        .remove("webhook_url")
        .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
        .unwrap_or_default();

    let games: BTreeMap<String, bool> = map
        .remove("games")
        .and_then(|v| v.as_object().cloned())
        .map(|games| {
            games
                .into_iter()
                .filter_map(|(key, enabled)| enabled.as_bool().map(|b| (key, b)))
                .collect()
        })
        .unwrap_or_default();

    if !map.contains_key("webhooks") {
        map.insert("webhooks".to_string(), Value::Array(Vec::new()));
    }

    if !url.is_empty()
        && let Some(Value::Array(hooks)) = map.get_mut("webhooks")
        && !hooks.iter().any(|hook| hook["url"].as_str() == Some(url.as_str()))
    {
        let entry = WebhookEntry::new(LEGACY_WEBHOOK_NAME, url, games);
        if let Ok(value) = serde_json::to_value(entry) {
            hooks.push(value);
        }
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn games(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_legacy_migration() {
        let legacy = json!({
            "webhook_url": "https://discord.test/api/webhooks/1/abc",
            "check_interval": 120,
            "games": { "genshin": true, "starrail": false }
        });

        let (config, migrated) = Config::from_document(legacy).unwrap();
        assert!(migrated);
        assert_eq!(config.check_interval, 120);
        assert_eq!(config.webhooks.len(), 1);

        let hook = &config.webhooks[0];
        assert_eq!(hook.name, "Default");
        assert_eq!(hook.url, "https://discord.test/api/webhooks/1/abc");
        assert!(hook.is_enabled(Game::Genshin));
        assert!(!hook.is_enabled(Game::StarRail));
        // missing games default to enabled
        assert!(hook.is_enabled(Game::Zenless));

        let serialized = serde_json::to_value(&config).unwrap();
        assert!(serialized.get("webhook_url").is_none());
        assert!(serialized.get("games").is_none());
    }

    #[test]
    fn test_legacy_empty_url_yields_no_webhooks() {
        let (config, migrated) =
            Config::from_document(json!({ "webhook_url": "", "check_interval": 300 })).unwrap();

        assert!(migrated);
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn test_current_shape_is_not_migrated() {
        let doc = json!({
            "webhooks": [{ "name": "main", "url": "https://a.test", "games": { "genshin": true } }],
            "check_interval": 10,
            "timezone": "Asia/Tokyo"
        });

        let (config, migrated) = Config::from_document(doc).unwrap();
        assert!(!migrated);
        assert_eq!(config.check_interval, MIN_CHECK_INTERVAL);
        assert_eq!(config.timezone, "Asia/Tokyo");
    }

    #[test]
    fn test_invalid_stored_timezone_falls_back() {
        let (config, _) = Config::from_document(json!({ "timezone": "Mars/Olympus" })).unwrap();
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn test_interval_floor() {
        let mut config = Config::default();

        config.set_check_interval(5);
        assert_eq!(config.check_interval, 60);

        config.set_check_interval(-30);
        assert_eq!(config.check_interval, 60);

        config.set_check_interval(900);
        assert_eq!(config.interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_timezone_keeps_prior() {
        let mut config = Config::default();

        assert!(config.set_timezone("Europe/Berlin"));
        assert!(!config.set_timezone("Europe/Atlantis"));
        assert_eq!(config.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let mut config = Config::default();
        config
            .add_webhook(WebhookEntry::new("a", "https://a.test", BTreeMap::new()))
            .unwrap();

        let err = config
            .add_webhook(WebhookEntry::new("b", "https://a.test", BTreeMap::new()))
            .unwrap_err();

        assert_eq!(err, ConfigError::DuplicateUrl("https://a.test".to_string()));
        assert_eq!(config.webhooks.len(), 1);
    }

    #[test]
    fn test_update_and_remove() {
        let mut config = Config::default();
        config
            .add_webhook(WebhookEntry::new("a", "https://a.test", BTreeMap::new()))
            .unwrap();
        config
            .add_webhook(WebhookEntry::new("b", "https://b.test", BTreeMap::new()))
            .unwrap();

        // keeping its own url is fine, taking another entry's is not
        assert!(config
            .update_webhook(0, WebhookEntry::new("a2", "https://a.test", BTreeMap::new()))
            .is_ok());
        assert!(config
            .update_webhook(0, WebhookEntry::new("a3", "https://b.test", BTreeMap::new()))
            .is_err());
        assert_eq!(config.webhooks[0].name, "a2");

        assert_eq!(config.remove_webhook(5), Err(ConfigError::NotFound(5)));
        assert_eq!(config.remove_webhook(1).unwrap().name, "b");
        assert_eq!(config.webhooks.len(), 1);
    }

    #[test]
    fn test_replace_webhooks_rejects_non_list() {
        let mut config = Config::default();
        config
            .add_webhook(WebhookEntry::new("a", "https://a.test", BTreeMap::new()))
            .unwrap();

        assert!(config.replace_webhooks(json!({ "url": "https://b.test" })).is_err());
        assert_eq!(config.webhooks[0].url, "https://a.test");

        config
            .replace_webhooks(json!([{ "name": "b", "url": "https://b.test" }]))
            .unwrap();
        assert_eq!(config.webhooks.len(), 1);
        assert!(config.webhooks[0].is_enabled(Game::StarRail));
    }

    #[test]
    fn test_enabled_webhooks() {
        let mut config = Config::default();
        config
            .add_webhook(WebhookEntry::new(
                "one",
                "https://one.test",
                games(&[("genshin", true)]),
            ))
            .unwrap();
        config
            .add_webhook(WebhookEntry::new(
                "two",
                "https://two.test",
                games(&[("genshin", false)]),
            ))
            .unwrap();

        let enabled = config.enabled_webhooks(Game::Genshin);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].url, "https://one.test");
        assert_eq!(config.enabled_webhooks(Game::Zenless).len(), 2);
    }
}
