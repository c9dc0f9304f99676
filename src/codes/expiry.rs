use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

use super::CodeRecord;

/// Candidate fields in probe order. Sources disagree on naming and on whether they send ISO
/// strings or epochs, so every field goes through the same shape-driven parser.
const EXPIRATION_FIELDS: &[&str] = &[
    "expires",
    "expiry",
    "expiration",
    "expires_at",
    "expiry_date",
    "expiration_date",
    "valid_until",
    "end_time",
    "endTime",
];

// anything above this is assumed to be milliseconds (10^11 seconds is ~year 5138)
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Returns the first expiration instant any candidate field yields, if any
pub fn parse_expiration(record: &CodeRecord) -> Option<DateTime<Utc>> {
    EXPIRATION_FIELDS.iter().find_map(|field| {
        record
            .field(field)
            .filter(|value| !is_empty(value))
            .and_then(parse_value)
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Numbers are epochs; strings are ISO timestamps or numeric epochs
fn parse_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(_) => parse_epoch(value),
        Value::String(_) => parse_iso(value).or_else(|| parse_epoch(value)),
        _ => None,
    }
}

fn parse_iso(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // offset-less timestamps are taken as UTC
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_epoch(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    if secs.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(secs)
    } else {
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpirationStatus {
    Expired,
    Expiring,
    Active,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Expired,
    Critical,
    Soon,
    Normal,
}

impl Urgency {
    pub fn icon(&self, known: bool) -> &'static str {
        match (self, known) {
            (_, false) => "❔",
            (Self::Expired, _) => "❌",
            (Self::Critical, _) => "🔥",
            (Self::Soon, _) => "⏰",
            (Self::Normal, _) => "📅",
        }
    }
}

/// Classification of an expiration instant relative to "now"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expiration {
    pub status: ExpirationStatus,
    pub urgency: Urgency,
    /// Relative time left, e.g. `5 hours`; `None` when expired or unknown
    pub remaining: Option<String>,
}

impl Expiration {
    pub fn is_known(&self) -> bool {
        self.status != ExpirationStatus::Unknown
    }
}

/// Classifies `expires` against `now`.
///
/// Boundaries: remaining <= 0 is expired, (0, 48h] critical, (48h, 72h] soon, above that normal.
pub fn get_expiration_status(expires: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Expiration {
    let Some(expires) = expires else {
        return Expiration {
            status: ExpirationStatus::Unknown,
            urgency: Urgency::Normal,
            remaining: None,
        };
    };

    let remaining = expires - now;

    if remaining <= TimeDelta::zero() {
        Expiration {
            status: ExpirationStatus::Expired,
            urgency: Urgency::Expired,
            remaining: None,
        }
    } else if remaining <= TimeDelta::hours(48) {
        let text = if remaining < TimeDelta::minutes(1) {
            "less than a minute".to_string()
        } else if remaining < TimeDelta::hours(1) {
            plural(remaining.num_minutes(), "minute")
        } else {
            plural(remaining.num_hours(), "hour")
        };

        Expiration {
            status: ExpirationStatus::Expiring,
            urgency: Urgency::Critical,
            remaining: Some(text),
        }
    } else if remaining <= TimeDelta::hours(72) {
        Expiration {
            status: ExpirationStatus::Active,
            urgency: Urgency::Soon,
            remaining: Some(plural(remaining.num_hours(), "hour")),
        }
    } else {
        Expiration {
            status: ExpirationStatus::Active,
            urgency: Urgency::Normal,
            remaining: Some(plural(remaining.num_days(), "day")),
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Parses an IANA zone name, falling back to UTC
pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Absolute instant rendered in the operator's zone, e.g. `Jan 01, 2024 09:00 KST`
pub fn format_in_timezone(instant: DateTime<Utc>, timezone: &str) -> String {
    instant
        .with_timezone(&resolve_timezone(timezone))
        .format("%b %d, %Y %H:%M %Z")
        .to_string()
}

/// Single embed line describing an expiration, icon included
pub fn describe(expires: Option<DateTime<Utc>>, now: DateTime<Utc>, timezone: &str) -> String {
    let classification = get_expiration_status(expires, now);
    let icon = classification.urgency.icon(classification.is_known());

    match (expires, classification.status, classification.remaining) {
        (Some(at), ExpirationStatus::Expired, _) => {
            format!("{} **Expired** ({})", icon, format_in_timezone(at, timezone))
        }
        (Some(at), _, Some(remaining)) => format!(
            "{} **Expires in {}** ({})",
            icon,
            remaining,
            format_in_timezone(at, timezone)
        ),
        _ => format!("{} **Expiration:** unknown", icon),
    }
}
