use bson::doc;
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateOptions,
};
use mongodb::{Client as MongoClient, Collection, Database, IndexModel};
use tracing::error;

use crate::error::{is_duplicate_key, Result, StoreError};
use crate::models::{BackfillStateDoc, MessageDoc, UserDoc};

/// Adapter over the document store (§4.B). The core does not retry or
/// paper over genuine write failures here — only duplicate-key
/// collisions, which are an expected outcome of the dual live/backfill
/// ingestion paths, are swallowed.
#[derive(Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = MongoClient::with_options(options)?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn messages(&self) -> Collection<MessageDoc> {
        self.db.collection("messages")
    }

    fn backfill(&self) -> Collection<BackfillStateDoc> {
        self.db.collection("channel_backfill")
    }

    fn users(&self) -> Collection<UserDoc> {
        self.db.collection("users")
    }

    /// Creates every index listed in §4.B if absent. Idempotent:
    /// `create_index` on an already-present equivalent index is a no-op
    /// on the server.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.messages()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "message_id": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.messages()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "channel_id": 1, "timestamp_ms": -1 })
                    .build(),
            )
            .await?;
        self.messages()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "author_id": 1, "timestamp_ms": -1 })
                    .build(),
            )
            .await?;

        self.backfill()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "channel_id": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.backfill()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "done": 1, "updated_at": 1 })
                    .build(),
            )
            .await?;

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "last_seen_ms": -1 })
                    .build(),
            )
            .await?;

        Ok(())
    }

    /// Idempotent insert: a duplicate `message_id` is an expected
    /// cross-path dedup outcome and silently succeeds; any other write
    /// error propagates (§4.B, §7).
    pub async fn insert_message(&self, doc: MessageDoc) -> Result<()> {
        match self.messages().insert_one(doc).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(StoreError::Mongo(e)),
        }
    }

    /// Best-effort: failures are logged and swallowed rather than
    /// propagated, since the user projection is informational (§4.B).
    pub async fn upsert_user(
        &self,
        user_id: &str,
        username: Option<&str>,
        global_name: Option<&str>,
        last_seen_ms: i64,
    ) {
        let filter = doc! { "user_id": user_id };
        let update = doc! {
            "$set": {
                "username": username,
                "global_name": global_name,
                "last_seen_ms": last_seen_ms,
                "updated_at": bson::DateTime::now(),
            },
            "$setOnInsert": { "user_id": user_id },
        };
        let options = UpdateOptions::builder().upsert(true).build();

        if let Err(e) = self.users().update_one(filter, update).with_options(options).await {
            error!(error = %e, user_id, "failed to upsert user");
        }
    }

    /// Insert-only seed; a duplicate `channel_id` means the channel was
    /// already seeded and silently succeeds (§4.B).
    pub async fn seed_backfill(&self, channel_id: &str, guild_id: Option<&str>) -> Result<()> {
        let now = bson::DateTime::now();
        let doc = BackfillStateDoc {
            channel_id: channel_id.to_string(),
            guild_id: guild_id.map(String::from),
            cursor_before: None,
            done: false,
            claimed: false,
            created_at: now,
            updated_at: now,
            error_count: 0,
        };

        match self.backfill().insert_one(doc).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(StoreError::Mongo(e)),
        }
    }

    /// Atomic find-and-modify claim of one unclaimed, unfinished channel,
    /// oldest-updated first (§4.B). Returns the post-image, i.e. already
    /// marked `claimed=true`.
    pub async fn claim_next_channel(&self) -> Result<Option<BackfillStateDoc>> {
        let filter = doc! { "done": false, "claimed": { "$ne": true } };
        let update = doc! {
            "$set": { "claimed": true, "updated_at": bson::DateTime::now() },
        };
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "updated_at": 1 })
            .return_document(ReturnDocument::After)
            .build();

        let claimed = self
            .backfill()
            .find_one_and_update(filter, update)
            .with_options(options)
            .await?;
        Ok(claimed)
    }

    /// Releases a claim, recording the new cursor/terminal state and
    /// optionally bumping `error_count` (§4.B).
    pub async fn update_channel_state(
        &self,
        channel_id: &str,
        cursor_before: Option<&str>,
        done: bool,
        error_delta: i64,
    ) -> Result<()> {
        let mut update = doc! {
            "$set": {
                "cursor_before": cursor_before,
                "done": done,
                "claimed": false,
                "updated_at": bson::DateTime::now(),
            },
        };
        if error_delta > 0 {
            update.insert("$inc", doc! { "error_count": error_delta });
        }

        self.backfill()
            .update_one(doc! { "channel_id": channel_id }, update)
            .await?;
        Ok(())
    }
}
