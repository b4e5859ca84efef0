use chrono::DateTime;
use indexer_types::{ApiUser, MessageAuthor, MessageSource};
use serde_json::Value;

/// A message payload projected to the fields §4.C extracts, still
/// carrying the full upstream payload in `raw` for storage.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub message_id: String,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
    pub author_id: Option<String>,
    pub author_username: Option<String>,
    pub author_global_name: Option<String>,
    pub timestamp: Option<String>,
    pub timestamp_ms: i64,
    pub source: MessageSource,
    pub raw: Value,
}

/// Pure projection from an upstream message payload to the shape §3
/// stores (§4.C). Only `id` is load-bearing: absent or non-string and
/// the whole payload is rejected. Every other field is read tolerantly
/// — missing or wrong-typed becomes `None` rather than failing the
/// message.
pub fn normalize(raw: Value, source: MessageSource) -> Option<NormalizedMessage> {
    let message_id = str_field(&raw, "id")?;

    let channel_id = string_field(&raw, "channel_id");
    let guild_id = string_field(&raw, "guild_id");
    let timestamp = string_field(&raw, "timestamp");
    let timestamp_ms = timestamp.as_deref().map(parse_timestamp_ms).unwrap_or(0);

    let author = extract_author(&raw);

    Some(NormalizedMessage {
        message_id,
        channel_id,
        guild_id,
        author_id: author.as_ref().map(|a| a.id.clone()),
        author_username: author.as_ref().and_then(|a| a.username.clone()),
        author_global_name: author.as_ref().and_then(|a| a.global_name.clone()),
        timestamp,
        timestamp_ms,
        source,
        raw,
    })
}

/// `message.author` is, on the wire, the same user shape every other
/// endpoint returns ([`ApiUser`]); deserializing through it rather than
/// picking fields off by hand means a wrong-typed or absent `author`
/// (object entirely, or its required `id`) tolerantly yields `None`
/// instead of panicking or rejecting the message, and the result is
/// converted into the normalizer's own [`MessageAuthor`] projection.
fn extract_author(raw: &Value) -> Option<MessageAuthor> {
    let author = raw.get("author")?;
    serde_json::from_value::<ApiUser>(author.clone())
        .ok()
        .map(MessageAuthor::from)
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)?.as_str().map(String::from)
}

fn string_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(String::from)
}

/// ISO-8601-with-offset parse; zero on any failure (§4.C).
fn parse_timestamp_ms(ts: &str) -> i64 {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_id() {
        let raw = json!({ "content": "hi" });
        assert!(normalize(raw, MessageSource::Live).is_none());
    }

    #[test]
    fn rejects_non_string_id() {
        let raw = json!({ "id": 123 });
        assert!(normalize(raw, MessageSource::Live).is_none());
    }

    #[test]
    fn extracts_full_author_and_timestamp() {
        let raw = json!({
            "id": "9",
            "channel_id": "c1",
            "guild_id": "g1",
            "timestamp": "2024-01-02T03:04:05.000+00:00",
            "author": { "id": "u1", "username": "alice", "global_name": "Alice" },
        });
        let msg = normalize(raw, MessageSource::Backfill).unwrap();
        assert_eq!(msg.message_id, "9");
        assert_eq!(msg.channel_id.as_deref(), Some("c1"));
        assert_eq!(msg.guild_id.as_deref(), Some("g1"));
        assert_eq!(msg.author_id.as_deref(), Some("u1"));
        assert_eq!(msg.author_username.as_deref(), Some("alice"));
        assert_eq!(msg.author_global_name.as_deref(), Some("Alice"));
        assert_eq!(msg.timestamp_ms, 1704164645000);
        assert_eq!(msg.source.as_str(), "backfill");
    }

    #[test]
    fn tolerates_missing_author_and_timestamp() {
        let raw = json!({ "id": "1" });
        let msg = normalize(raw, MessageSource::Live).unwrap();
        assert_eq!(msg.author_id, None);
        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.timestamp_ms, 0);
    }

    #[test]
    fn zeroes_timestamp_on_unparseable_value() {
        let raw = json!({ "id": "1", "timestamp": "not a date" });
        let msg = normalize(raw, MessageSource::Live).unwrap();
        assert_eq!(msg.timestamp.as_deref(), Some("not a date"));
        assert_eq!(msg.timestamp_ms, 0);
    }

    #[test]
    fn tolerates_wrong_typed_author() {
        let raw = json!({ "id": "1", "author": "not an object" });
        let msg = normalize(raw, MessageSource::Live).unwrap();
        assert_eq!(msg.author_id, None);
    }

    #[test]
    fn author_missing_required_id_is_dropped_entirely() {
        let raw = json!({ "id": "1", "author": { "username": "alice" } });
        let msg = normalize(raw, MessageSource::Live).unwrap();
        assert_eq!(msg.author_id, None);
        assert_eq!(msg.author_username, None);
    }

    #[test]
    fn author_tolerates_missing_global_name() {
        let raw = json!({ "id": "1", "author": { "id": "u1", "username": "alice" } });
        let msg = normalize(raw, MessageSource::Live).unwrap();
        assert_eq!(msg.author_id.as_deref(), Some("u1"));
        assert_eq!(msg.author_username.as_deref(), Some("alice"));
        assert_eq!(msg.author_global_name, None);
    }
}
