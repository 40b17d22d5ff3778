//! Refresh events and changed-key computation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;

/// Event broadcast after a refresh completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshEvent {
    /// Keys whose effective value was added, removed, or changed
    pub changed_keys: Vec<String>,
    /// Timestamp of the refresh
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RefreshEvent {
    pub fn new(changed_keys: Vec<String>) -> Self {
        Self {
            changed_keys,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Keys whose effective value differs between two flattened views
///
/// Covers keys added, removed, and changed. The result is sorted so event
/// payloads are deterministic.
pub fn changed_keys(
    before: &HashMap<String, Value>,
    after: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = Vec::new();

    for (key, value) in before {
        match after.get(key) {
            Some(new_value) if new_value == value => {}
            _ => changed.push(key.clone()),
        }
    }
    for key in after.keys() {
        if !before.contains_key(key) {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}
