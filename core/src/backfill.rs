use std::sync::Arc;
use std::time::Duration;

use indexer_http::{Client, RateLimitedResponse};
use indexer_store::{BackfillStateDoc, Store};
use indexer_types::MessageSource;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::ingest::ingest_message;

const MESSAGES_ROUTE_KEY: &str = "GET:/channels/:channelId/messages";
const NO_CLAIM_SLEEP: Duration = Duration::from_secs(2);
const DEFAULT_RETRY_MS: u64 = 1000;

/// One backfill worker's loop (§4.D). `N` identical workers run this
/// concurrently; `Store::claim_next_channel`'s atomic find-and-modify
/// is the only coordination between them — there is no other shared
/// in-memory state.
pub async fn run_worker(
    worker_id: usize,
    client: Arc<Client>,
    store: Store,
    page_size: u32,
    request_delay_ms: u64,
) {
    loop {
        let claim = match store.claim_next_channel().await {
            Ok(Some(claim)) => claim,
            Ok(None) => {
                tokio::time::sleep(NO_CLAIM_SLEEP).await;
                continue;
            }
            Err(e) => {
                error!(worker_id, error = %e, "failed to claim a backfill channel");
                tokio::time::sleep(NO_CLAIM_SLEEP).await;
                continue;
            }
        };

        let sleep_for = process_claim(&client, &store, &claim, page_size, request_delay_ms).await;
        tokio::time::sleep(sleep_for).await;
    }
}

/// What a fetched page means for the claim's outcome (§4.D step 5).
/// Classifying the response is pure and IO-free — only acting on the
/// classification touches the store.
#[derive(Debug, PartialEq)]
enum PageOutcome {
    /// 2xx with a non-empty array: ingest `messages`, advance the
    /// cursor to `new_cursor` (the id of the page's oldest message).
    Ingest {
        messages: Vec<Value>,
        new_cursor: Option<String>,
    },
    /// 2xx with an empty array: the channel is fully backfilled.
    Done,
    /// HTTP 429: not an error: the channel is released and retried
    /// after `retry_ms`.
    RateLimited { retry_ms: u64 },
    /// Any other non-2xx, or a 2xx whose body isn't a JSON array.
    Failed,
}

fn classify_page(response: &RateLimitedResponse) -> PageOutcome {
    if response.is_rate_limited() {
        let retry_ms = response.rate_limit.retry_after_ms.unwrap_or(DEFAULT_RETRY_MS);
        return PageOutcome::RateLimited { retry_ms };
    }

    if !response.is_success() {
        return PageOutcome::Failed;
    }

    match response.json::<Vec<Value>>() {
        Err(_) => PageOutcome::Failed,
        Ok(messages) if messages.is_empty() => PageOutcome::Done,
        Ok(messages) => {
            // Upstream returns newest-first; the last element of the
            // page is the oldest, and becomes the exclusive upper
            // bound for the next page.
            let new_cursor = messages
                .last()
                .and_then(|m| m.get("id"))
                .and_then(Value::as_str)
                .map(String::from);
            PageOutcome::Ingest { messages, new_cursor }
        }
    }
}

/// Fetches and processes one page for a claimed channel, returning the
/// duration the worker should sleep before its next iteration (§4.D
/// steps 3-6). Every branch releases the claim via
/// `update_channel_state` before returning.
async fn process_claim(
    client: &Client,
    store: &Store,
    claim: &BackfillStateDoc,
    page_size: u32,
    request_delay_ms: u64,
) -> Duration {
    let channel_id = claim.channel_id.as_str();
    let cursor_before = claim.cursor_before.as_deref();

    let mut path = format!("/channels/{channel_id}/messages?limit={page_size}");
    if let Some(cursor) = cursor_before {
        path.push_str(&format!("&before={cursor}"));
    }

    let response = match client.get(&path, MESSAGES_ROUTE_KEY).await {
        Ok(response) => response,
        Err(e) => {
            warn!(channel_id, error = %e, "backfill request failed");
            release(store, channel_id, cursor_before, false, 1).await;
            return Duration::from_millis(request_delay_ms);
        }
    };

    match classify_page(&response) {
        PageOutcome::RateLimited { retry_ms } => {
            warn!(channel_id, retry_ms, "backfill page rate limited");
            release(store, channel_id, cursor_before, false, 1).await;
            Duration::from_millis(retry_ms)
        }
        PageOutcome::Failed => {
            warn!(channel_id, status = response.status, "backfill page failed");
            release(store, channel_id, cursor_before, false, 1).await;
            Duration::from_millis(request_delay_ms)
        }
        PageOutcome::Done => {
            debug!(channel_id, "backfill reached the end of channel history");
            release(store, channel_id, cursor_before, true, 0).await;
            // Step 6's post-iteration sleep: the 429/Failed branches
            // above already returned their own sleep.
            post_iteration_sleep(&response, request_delay_ms)
        }
        PageOutcome::Ingest { messages, new_cursor } => {
            for raw in messages {
                if let Err(e) = ingest_message(store, raw, MessageSource::Backfill).await {
                    error!(channel_id, error = %e, "failed to ingest a backfilled message");
                }
            }

            match new_cursor {
                Some(cursor) => release(store, channel_id, Some(&cursor), false, 0).await,
                None => {
                    warn!(channel_id, "backfill page's oldest message had no id; leaving cursor unchanged");
                    release(store, channel_id, cursor_before, false, 1).await;
                }
            }

            post_iteration_sleep(&response, request_delay_ms)
        }
    }
}

fn post_iteration_sleep(response: &RateLimitedResponse, request_delay_ms: u64) -> Duration {
    match response.rate_limit.reset_after_ms {
        Some(reset_ms) => Duration::from_millis(reset_ms),
        None => Duration::from_millis(request_delay_ms),
    }
}

async fn release(
    store: &Store,
    channel_id: &str,
    cursor_before: Option<&str>,
    done: bool,
    error_delta: i64,
) {
    if let Err(e) = store
        .update_channel_state(channel_id, cursor_before, done, error_delta)
        .await
    {
        error!(channel_id, error = %e, "failed to persist backfill channel state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_http::RateLimitSignal;

    fn response(status: u16, body: &str, rate_limit: RateLimitSignal) -> RateLimitedResponse {
        RateLimitedResponse {
            status,
            body: body.to_string(),
            rate_limit,
        }
    }

    #[test]
    fn empty_array_is_terminal() {
        let resp = response(200, "[]", RateLimitSignal::default());
        assert_eq!(classify_page(&resp), PageOutcome::Done);
    }

    #[test]
    fn non_empty_array_selects_last_element_as_new_cursor() {
        let resp = response(200, r#"[{"id":"9"},{"id":"7"},{"id":"5"}]"#, RateLimitSignal::default());
        match classify_page(&resp) {
            PageOutcome::Ingest { messages, new_cursor } => {
                assert_eq!(messages.len(), 3);
                assert_eq!(new_cursor.as_deref(), Some("5"));
            }
            other => panic!("expected Ingest, got {other:?}"),
        }
    }

    #[test]
    fn non_array_2xx_body_is_failed() {
        let resp = response(200, r#"{"not":"an array"}"#, RateLimitSignal::default());
        assert_eq!(classify_page(&resp), PageOutcome::Failed);
    }

    #[test]
    fn server_error_is_failed() {
        let resp = response(500, "internal error", RateLimitSignal::default());
        assert_eq!(classify_page(&resp), PageOutcome::Failed);
    }

    #[test]
    fn rate_limited_reports_retry_ms_from_signal() {
        let resp = response(
            429,
            r#"{"retry_after":1.5,"global":false}"#,
            RateLimitSignal { retry_after_ms: Some(1500), reset_after_ms: None },
        );
        assert_eq!(classify_page(&resp), PageOutcome::RateLimited { retry_ms: 1500 });
    }

    #[test]
    fn rate_limited_without_signal_falls_back_to_default() {
        let resp = response(429, "{}", RateLimitSignal::default());
        assert_eq!(classify_page(&resp), PageOutcome::RateLimited { retry_ms: DEFAULT_RETRY_MS });
    }

    #[test]
    fn page_missing_id_on_oldest_message_yields_no_cursor() {
        let resp = response(200, r#"[{"content":"no id here"}]"#, RateLimitSignal::default());
        match classify_page(&resp) {
            PageOutcome::Ingest { new_cursor, .. } => assert_eq!(new_cursor, None),
            other => panic!("expected Ingest, got {other:?}"),
        }
    }
}
