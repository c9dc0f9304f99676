pub mod client;
pub mod expiry;

use serde_json::Value;

/// A single raw entry from a source's `active` array.
///
/// Records are kept as loose JSON; the source never promised a stable shape, so fields are read
/// through the accessors below and anything unexpected degrades to "absent".
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRecord(pub Value);

impl CodeRecord {
    /// Raw code string as published
    pub fn code(&self) -> &str {
        self.0.get("code").and_then(Value::as_str).unwrap_or("").trim()
    }

    /// Upper-cased code, used for history comparisons
    pub fn normalized_code(&self) -> String {
        self.code().to_uppercase()
    }

    /// Rewards rendered as `name xcount`, in source order
    pub fn reward_items(&self) -> Vec<String> {
        let Some(rewards) = self.0.get("rewards") else {
            return Vec::new();
        };

        match rewards {
            Value::Array(items) => items.iter().map(render_reward).collect(),
            Value::Null => Vec::new(),
            other => vec![render_reward(other)],
        }
    }

    pub fn reward_summary(&self) -> Option<String> {
        let items = self.reward_items();
        if items.is_empty() {
            None
        } else {
            Some(items.join(", "))
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl From<Value> for CodeRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn render_reward(reward: &Value) -> String {
    match reward {
        Value::Object(map) => {
            if let Some(name) = map.get("name") {
                let count = map
                    .get("count")
                    .or_else(|| map.get("amount"))
                    .map(plain_string)
                    .unwrap_or_else(|| "1".to_string());

                format!("{} x{}", plain_string(name), count)
            } else if let Some(value) = map.get("value") {
                plain_string(value)
            } else {
                reward.to_string()
            }
        }
        other => plain_string(other),
    }
}

/// Strings without their JSON quotes, everything else as serialized JSON
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_rewards() {
        let record = CodeRecord(json!({
            "code": "abc123",
            "rewards": [
                { "name": "Primogem", "count": 60 },
                { "name": "Mora", "count": 10000 },
                { "name": "Hero's Wit" },
            ]
        }));

        assert_eq!(record.normalized_code(), "ABC123");
        assert_eq!(
            record.reward_summary().as_deref(),
            Some("Primogem x60, Mora x10000, Hero's Wit x1")
        );
    }

    #[test]
    fn test_unstructured_rewards() {
        let record = CodeRecord(json!({
            "code": "XYZ",
            "rewards": ["Stellar Jade x50", { "value": "Credit x5000" }, 7]
        }));

        assert_eq!(
            record.reward_items(),
            vec!["Stellar Jade x50", "Credit x5000", "7"]
        );
    }

    #[test]
    fn test_missing_fields() {
        let record = CodeRecord(json!({ "rewards": null }));
        assert_eq!(record.code(), "");
        assert!(record.reward_summary().is_none());

        let record = CodeRecord(json!("not an object"));
        assert_eq!(record.code(), "");
        assert!(record.reward_items().is_empty());
    }
}
