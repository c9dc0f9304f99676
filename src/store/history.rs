use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::games::Game;

/// Codes already announced, per game.
///
/// Keys are game keys (`genshin`, ...). Codes are stored upper-cased and each appears at most once
/// per game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentHistory {
    #[serde(default)]
    codes: BTreeMap<String, Vec<String>>,

    /// `<game_key, <code, rfc3339 expiration>>`; codes without a known expiration are absent
    #[serde(default)]
    expirations: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for SentHistory {
    fn default() -> Self {
        Self {
            codes: Game::ALL
                .iter()
                .map(|game| (game.key().to_string(), Vec::new()))
                .collect(),
            expirations: BTreeMap::new(),
        }
    }
}

impl SentHistory {
    /// Reads a stored document, accepting both the current shape and the older flat
    /// `{ "<game>": [codes] }` shape
    pub fn from_document(doc: Value) -> Result<Self, serde_json::Error> {
        let is_current = doc
            .as_object()
            .is_some_and(|map| map.contains_key("codes") || map.contains_key("expirations"));

        let mut history = if is_current {
            serde_json::from_value::<SentHistory>(doc)?
        } else {
            let codes: BTreeMap<String, Vec<String>> = serde_json::from_value(doc)?;
            Self {
                codes,
                expirations: BTreeMap::new(),
            }
        };

        for game in Game::ALL {
            history.codes.entry(game.key().to_string()).or_default();
        }

        Ok(history)
    }

    pub fn contains(&self, game: Game, code: &str) -> bool {
        let code = code.to_uppercase();
        self.codes
            .get(game.key())
            .is_some_and(|codes| codes.contains(&code))
    }

    /// Appends `code` (upper-cased) for `game`, returning `false` if it was already present
    pub fn record(&mut self, game: Game, code: &str, expires: Option<DateTime<Utc>>) -> bool {
        let code = code.to_uppercase();
        let codes = self.codes.entry(game.key().to_string()).or_default();
        if codes.contains(&code) {
            return false;
        }

        codes.push(code.clone());
        if let Some(expires) = expires {
            self.expirations
                .entry(game.key().to_string())
                .or_default()
                .insert(code, expires.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        true
    }

    pub fn codes(&self, game: Game) -> &[String] {
        self.codes
            .get(game.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn expiration(&self, game: Game, code: &str) -> Option<DateTime<Utc>> {
        self.expirations
            .get(game.key())?
            .get(code)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Forgets one game's codes, or everything when `game` is `None`
    pub fn clear(&mut self, game: Option<Game>) {
        match game {
            Some(game) => {
                self.codes.insert(game.key().to_string(), Vec::new());
                self.expirations.remove(game.key());
            }
            None => *self = Self::default(),
        }
    }
}
