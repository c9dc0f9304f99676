use std::fmt;

use serde::{Deserialize, Serialize};

/// Games we track codes for.
///
/// The set is fixed at compile time; everything a notification needs to brand itself for a game
/// hangs off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Genshin,
    StarRail,
    Zenless,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::Genshin, Game::StarRail, Game::Zenless];

    /// Key used in persisted documents, route payloads and the source endpoint path
    pub fn key(&self) -> &'static str {
        match self {
            Self::Genshin => "genshin",
            Self::StarRail => "starrail",
            Self::Zenless => "zenless",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Genshin => "Genshin Impact",
            Self::StarRail => "Honkai: Star Rail",
            Self::Zenless => "Zenless Zone Zero",
        }
    }

    pub fn redeem_prefix(&self) -> &'static str {
        match self {
            Self::Genshin => "https://genshin.hoyoverse.com/en/gift?code=",
            Self::StarRail => "https://hsr.hoyoverse.com/gift?code=",
            Self::Zenless => "https://zenless.hoyoverse.com/redemption?code=",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            Self::Genshin => 0x00BFFF,
            Self::StarRail => 0x9B59B6,
            Self::Zenless => 0xF1C40F,
        }
    }

    /// Sender name shown on the webhook message
    pub fn mascot(&self) -> &'static str {
        match self {
            Self::Genshin => "Paimon",
            Self::StarRail => "Pom-Pom",
            Self::Zenless => "Bangboo",
        }
    }

    pub fn source_url(&self, api_base: &str) -> String {
        format!("{}/{}/codes", api_base.trim_end_matches('/'), self.key())
    }

    pub fn redeem_url(&self, code: &str) -> String {
        format!("{}{}", self.redeem_prefix(), code)
    }

    pub fn avatar_url(&self, avatar_base: Option<&str>) -> Option<String> {
        avatar_base.map(|base| format!("{}/{}.png", base.trim_end_matches('/'), self.key()))
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|game| game.key() == key)
    }
}

impl TryFrom<&str> for Game {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Game::from_key(value).ok_or_else(|| format!("unknown game key: {:?}", value))
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
