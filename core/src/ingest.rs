use indexer_store::{MessageDoc, Store, StoreError};
use indexer_types::MessageSource;
use serde_json::Value;
use tracing::debug;

use crate::normalize::{normalize, NormalizedMessage};

/// Bridges the normalizer (§4.C) to the store adapter (§4.B): both the
/// gateway dispatch handler and the backfill scheduler call this for
/// every message payload they observe, tagged with which path saw it.
///
/// A payload the normalizer rejects (missing `id`) is dropped silently
/// and counts as success — it was never a message the store should
/// know about. A genuine store write failure propagates so the caller
/// can apply its own retry/backoff policy (§7).
pub async fn ingest_message(
    store: &Store,
    raw: Value,
    source: MessageSource,
) -> Result<(), StoreError> {
    let Some(message) = normalize(raw, source) else {
        debug!("dropping payload with missing or non-string id");
        return Ok(());
    };

    let doc = to_message_doc(&message)?;
    store.insert_message(doc).await?;

    if let Some(author_id) = &message.author_id {
        store
            .upsert_user(
                author_id,
                message.author_username.as_deref(),
                message.author_global_name.as_deref(),
                message.timestamp_ms,
            )
            .await;
    }

    Ok(())
}

fn to_message_doc(message: &NormalizedMessage) -> Result<MessageDoc, StoreError> {
    Ok(MessageDoc {
        message_id: message.message_id.clone(),
        channel_id: message.channel_id.clone(),
        guild_id: message.guild_id.clone(),
        author_id: message.author_id.clone(),
        timestamp: message.timestamp.clone(),
        timestamp_ms: message.timestamp_ms,
        source: message.source.as_str().to_string(),
        raw: bson::to_bson(&message.raw)?,
        ingested_at: bson::DateTime::now(),
    })
}
