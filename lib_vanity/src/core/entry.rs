//! # Watch Entries
//!
//! The two kinds of registry entries and the helpers that derive their keys.
//!
//! Field names on disk follow the historical document layout (`userId`,
//! `channelId`, `guildId`, `vanityUrl`, ...) so existing data files load as-is.

use serde::{Deserialize, Serialize};

/// Scope id used when a request does not come from any scope (direct messages).
pub const NO_SCOPE: &str = "dm";

/// Separator between the scope id and the resource name in a composite key.
pub const KEY_SEPARATOR: char = '_';

/// Shortest resource name accepted after normalization.
pub const MIN_NAME_LEN: usize = 2;

/// Lowercases `raw` and drops every character outside `[a-z0-9-]`.
///
/// Idempotent: `normalize_name(&normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Normalizes `raw` and returns it only if it is long enough to be watched.
pub fn valid_name(raw: &str) -> Option<String> {
    let name = normalize_name(raw);
    (name.len() >= MIN_NAME_LEN).then_some(name)
}

/// Builds the registry key for `resource_name` inside `scope_id`.
pub fn composite_key(scope_id: &str, resource_name: &str) -> String {
    format!("{scope_id}{KEY_SEPARATOR}{resource_name}")
}

/// Returns the scope part of a composite key, or `None` for a legacy bare key.
pub fn key_scope(key: &str) -> Option<&str> {
    key.split_once(KEY_SEPARATOR).map(|(scope, _)| scope)
}

/// A claim target must look like a snowflake id: 17 to 19 ASCII digits.
pub fn is_valid_target_scope_id(id: &str) -> bool {
    (17..=19).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

fn default_scope() -> String {
    NO_SCOPE.to_string()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A request to be told when `resource_name` becomes available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    #[serde(rename = "userId")]
    pub requester_id: String,
    #[serde(rename = "channelId")]
    pub notify_target_id: String,
    #[serde(rename = "guildId", default = "default_scope")]
    pub scope_id: String,
    /// Empty only for legacy documents; filled from the key during load.
    #[serde(rename = "vanityUrl", default)]
    pub resource_name: String,
    /// Unix milliseconds. Advisory only.
    #[serde(rename = "addedAt", default)]
    pub created_at: i64,
}

impl WatchEntry {
    pub fn new(
        scope_id: impl Into<String>,
        resource_name: impl Into<String>,
        requester_id: impl Into<String>,
        notify_target_id: impl Into<String>,
    ) -> Self {
        Self {
            requester_id: requester_id.into(),
            notify_target_id: notify_target_id.into(),
            scope_id: scope_id.into(),
            resource_name: resource_name.into(),
            created_at: now_millis(),
        }
    }

    pub fn key(&self) -> String {
        composite_key(&self.scope_id, &self.resource_name)
    }
}

/// A watch that also claims the name for `target_scope_id` once it frees up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoClaimEntry {
    #[serde(flatten)]
    pub watch: WatchEntry,
    #[serde(rename = "targetGuildId")]
    pub target_scope_id: String,
    /// Display name captured at creation; may be stale.
    #[serde(rename = "targetGuildName", default)]
    pub target_scope_label: String,
}

impl AutoClaimEntry {
    pub fn new(
        watch: WatchEntry,
        target_scope_id: impl Into<String>,
        target_scope_label: impl Into<String>,
    ) -> Self {
        Self {
            watch,
            target_scope_id: target_scope_id.into(),
            target_scope_label: target_scope_label.into(),
        }
    }
}

/// Common view over both entry kinds, used by the registry store.
pub trait RegistryEntry {
    fn watch(&self) -> &WatchEntry;
    fn watch_mut(&mut self) -> &mut WatchEntry;
}

impl RegistryEntry for WatchEntry {
    fn watch(&self) -> &WatchEntry {
        self
    }

    fn watch_mut(&mut self) -> &mut WatchEntry {
        self
    }
}

impl RegistryEntry for AutoClaimEntry {
    fn watch(&self) -> &WatchEntry {
        &self.watch
    }

    fn watch_mut(&mut self) -> &mut WatchEntry {
        &mut self.watch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_and_lowercases() {
        assert_eq!(normalize_name("My Cool-Server!"), "mycool-server");
        assert_eq!(normalize_name("ABC_123"), "abc123");
        assert_eq!(normalize_name("ÄBC"), "bc");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["My Cool Server!", "--x--", "", "ÉÀ", "a_b.c", "ZZ top 99", "ﬃ"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn short_names_are_rejected() {
        assert_eq!(valid_name("a"), None);
        assert_eq!(valid_name("!!a!!"), None);
        assert_eq!(valid_name("ab"), Some("ab".to_string()));
    }

    #[test]
    fn composite_key_round_trips_scope() {
        let key = composite_key("123", "coolname");
        assert_eq!(key, "123_coolname");
        assert_eq!(key_scope(&key), Some("123"));
        assert_eq!(key_scope("coolname"), None);
    }

    #[test]
    fn target_scope_id_must_be_17_to_19_digits() {
        assert!(is_valid_target_scope_id("12345678901234567"));
        assert!(is_valid_target_scope_id("1234567890123456789"));
        assert!(!is_valid_target_scope_id("1234567890123456"));
        assert!(!is_valid_target_scope_id("12345678901234567890"));
        assert!(!is_valid_target_scope_id("1234567890123456a"));
        assert!(!is_valid_target_scope_id("999"));
    }

    #[test]
    fn autoclaim_entry_serializes_flat() {
        let entry = AutoClaimEntry::new(
            WatchEntry::new("5", "coolname", "U1", "C1"),
            "123456789012345678",
            "Target",
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["userId"], "U1");
        assert_eq!(value["channelId"], "C1");
        assert_eq!(value["guildId"], "5");
        assert_eq!(value["vanityUrl"], "coolname");
        assert_eq!(value["targetGuildId"], "123456789012345678");
        assert_eq!(value["targetGuildName"], "Target");
        // Creation time is stored as integer epoch milliseconds.
        assert!(value["addedAt"].as_i64().is_some_and(|ms| ms > 1_600_000_000_000));
    }

    #[test]
    fn missing_scope_defaults_to_sentinel() {
        let entry: WatchEntry =
            serde_json::from_str(r#"{"userId":"U1","channelId":"C1","vanityUrl":"abc"}"#).unwrap();
        assert_eq!(entry.scope_id, NO_SCOPE);
        assert_eq!(entry.created_at, 0);
    }
}
