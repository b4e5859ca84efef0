use bson::Bson;
use serde::{Deserialize, Serialize};

/// `messages` document (§3). Never updated after insert; the unique
/// index on `message_id` is what makes the second write of a collision
/// a no-op rather than an overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDoc {
    pub message_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub timestamp_ms: i64,
    pub source: String,
    /// The upstream payload verbatim, carried through as BSON rather
    /// than re-serialized to a string (§3).
    pub raw: Bson,
    pub ingested_at: bson::DateTime,
}

/// `users` document (§3) — latest-observed-identity projection, one row
/// per `user_id`, upserted on every message insert attempt regardless
/// of whether the message itself was a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    pub last_seen_ms: i64,
    pub updated_at: bson::DateTime,
}

/// `channel_backfill` document (§3) — one row per channel, tracking the
/// pagination cursor and completion/claim state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillStateDoc {
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub cursor_before: Option<String>,
    pub done: bool,
    pub claimed: bool,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub error_count: i64,
}
