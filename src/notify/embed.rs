use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::codes::CodeRecord;
use crate::codes::expiry::{describe, parse_expiration};
use crate::constants::{EMBED_FOOTER, TEST_EMBED_COLOR};
use crate::games::Game;

/// Body of a chat webhook execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub timestamp: String,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Builds the announcement for a newly found code.
///
/// `now` drives the expiration countdown; `timezone` only affects how the absolute expiration is
/// displayed.
pub fn code_announcement(
    game: Game,
    record: &CodeRecord,
    now: DateTime<Utc>,
    timezone: &str,
    avatar_base: Option<&str>,
) -> WebhookPayload {
    let code = record.code();
    let redeem_url = game.redeem_url(code);

    let mut description = format!("**Code:** `{}`", code);
    if let Some(rewards) = record.reward_summary() {
        description.push_str(&format!("\n**Rewards:** {}", rewards));
    }

    description.push_str(&format!(
        "\n{}",
        describe(parse_expiration(record), now, timezone)
    ));
    description.push_str(&format!("\n\n**Redeem:** [Click here]({})", redeem_url));

    WebhookPayload {
        username: Some(game.mascot().to_string()),
        avatar_url: game.avatar_url(avatar_base),
        embeds: vec![Embed {
            title: format!("🎁 New {} Code!", game.display_name()),
            description,
            color: game.color(),
            url: Some(redeem_url),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            footer: EmbedFooter {
                text: EMBED_FOOTER.to_string(),
            },
        }],
    }
}

pub fn test_message(webhook_name: &str, now: DateTime<Utc>) -> WebhookPayload {
    WebhookPayload {
        username: None,
        avatar_url: None,
        embeds: vec![Embed {
            title: "🔔 Test Notification".to_string(),
            description: format!(
                "Webhook **{}** is configured correctly for the code notifier!",
                webhook_name
            ),
            color: TEST_EMBED_COLOR,
            url: None,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            footer: EmbedFooter {
                text: EMBED_FOOTER.to_string(),
            },
        }],
    }
}
