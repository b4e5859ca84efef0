use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use reqwest::header::HeaderMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RETRY_AFTER_MS: i64 = 1000;
const MIN_RETRY_AFTER_MS: i64 = 250;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

struct Bucket {
    gate: Arc<Semaphore>,
    next_allowed_ms: AtomicI64,
}

impl Bucket {
    fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(1)),
            next_allowed_ms: AtomicI64::new(0),
        }
    }

    fn push_forward(&self, candidate_ms: i64) {
        self.next_allowed_ms.fetch_max(candidate_ms, Ordering::SeqCst);
    }
}

/// What the caller should do after a call, derived from response headers
/// observed while the bucket gate was held (§4.A observation rules).
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitSignal {
    /// Set on a 429 response; the interval the coordinator itself waited
    /// covers only the request just made — the caller re-enqueuing work
    /// is expected to sleep this long before trying again (§4.D step 5).
    pub retry_after_ms: Option<u64>,
    /// Set on a non-429 response whose bucket was exhausted
    /// (`X-RateLimit-Remaining <= 0`).
    pub reset_after_ms: Option<u64>,
}

/// A held bucket gate plus the bookkeeping needed to observe the
/// response before releasing it. Dropping the lease releases the gate.
pub struct RateLimitLease {
    route_key: String,
    bucket_key: String,
    bucket: Arc<Bucket>,
    _permit: OwnedSemaphorePermit,
}

/// Per-bucket serialization and global cooldown enforcement (§4.A, §5).
///
/// The bucket map is an eventually-consistent concurrent map
/// ([`DashMap`]); the global cooldown is a single atomic scalar updated
/// without locking, per the "mutable shared scalar" redesign note.
pub struct RateLimiter {
    global_next_allowed_ms: AtomicI64,
    route_to_bucket: DashMap<String, String>,
    buckets: DashMap<String, Arc<Bucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            global_next_allowed_ms: AtomicI64::new(0),
            route_to_bucket: DashMap::new(),
            buckets: DashMap::new(),
        }
    }

    /// Steps 1-4 of §4.A: wait for the global cooldown, resolve the
    /// bucket for `route_key`, acquire its gate, then wait for the
    /// bucket's own cooldown.
    pub async fn acquire(&self, route_key: &str) -> RateLimitLease {
        loop {
            self.wait_global().await;

            let bucket_key = self
                .route_to_bucket
                .get(route_key)
                .map(|r| r.clone())
                .unwrap_or_else(|| route_key.to_string());

            let bucket = self
                .buckets
                .entry(bucket_key.clone())
                .or_insert_with(|| Arc::new(Bucket::new()))
                .clone();

            let permit = bucket
                .gate
                .clone()
                .acquire_owned()
                .await
                .expect("bucket semaphore is never closed");

            // The global cooldown may have advanced while we waited on the
            // gate; re-check before committing to this acquisition.
            if self.wait_global_would_block() {
                drop(permit);
                continue;
            }

            self.wait_bucket(&bucket).await;

            return RateLimitLease {
                route_key: route_key.to_string(),
                bucket_key,
                bucket,
                _permit: permit,
            };
        }
    }

    /// Step 6 of §4.A, applied while the lease (and thus the gate) is
    /// still held. Returns what the caller should do next.
    pub fn observe(
        &self,
        lease: &RateLimitLease,
        status: u16,
        headers: &HeaderMap,
        body: &str,
    ) -> RateLimitSignal {
        if let Some(observed) = header_str(headers, "x-ratelimit-bucket") {
            self.learn_bucket(lease, observed);
        }

        if status == 429 {
            let retry_ms = retry_after_ms(headers, body).max(MIN_RETRY_AFTER_MS);
            let now = now_ms();
            lease.bucket.push_forward(now + retry_ms);
            let global = body_says_global(body);
            if global {
                self.global_next_allowed_ms.fetch_max(now + retry_ms, Ordering::SeqCst);
            }
            warn!(
                route = %lease.route_key,
                bucket = %lease.bucket_key,
                retry_ms,
                global,
                "rate limited (429)"
            );
            return RateLimitSignal {
                retry_after_ms: Some(retry_ms as u64),
                reset_after_ms: None,
            };
        }

        let remaining = parse_header::<i64>(headers, "x-ratelimit-remaining");
        let reset_after = parse_header::<f64>(headers, "x-ratelimit-reset-after");

        if remaining.is_some_and(|r| r <= 0) {
            if let Some(secs) = reset_after {
                let reset_ms = (secs * 1000.0).ceil() as i64;
                let reset_ms = reset_ms.max(MIN_RETRY_AFTER_MS);
                let now = now_ms();
                lease.bucket.push_forward(now + reset_ms);

                if header_str(headers, "x-ratelimit-global").is_some() {
                    self.global_next_allowed_ms.fetch_max(now + reset_ms, Ordering::SeqCst);
                }

                return RateLimitSignal {
                    retry_after_ms: None,
                    reset_after_ms: Some(reset_ms as u64),
                };
            }
        }

        RateLimitSignal::default()
    }

    fn learn_bucket(&self, lease: &RateLimitLease, observed_id: &str) {
        self.route_to_bucket
            .insert(lease.route_key.clone(), observed_id.to_string());

        if observed_id == lease.bucket_key {
            return;
        }

        // First sighting: move the route-keyed bucket under its real id
        // so subsequent acquisitions (which now resolve via
        // `route_to_bucket`) land on the same gate and cooldown state.
        if !self.buckets.contains_key(observed_id) {
            debug!(route = %lease.route_key, bucket = observed_id, "learned rate-limit bucket");
            self.buckets.insert(observed_id.to_string(), lease.bucket.clone());
        }
    }

    async fn wait_global(&self) {
        loop {
            let now = now_ms();
            let until = self.global_next_allowed_ms.load(Ordering::SeqCst);
            if until <= now {
                return;
            }
            tokio::time::sleep(Duration::from_millis((until - now) as u64)).await;
        }
    }

    fn wait_global_would_block(&self) -> bool {
        self.global_next_allowed_ms.load(Ordering::SeqCst) > now_ms()
    }

    async fn wait_bucket(&self, bucket: &Bucket) {
        loop {
            let now = now_ms();
            let until = bucket.next_allowed_ms.load(Ordering::SeqCst);
            if until <= now {
                return;
            }
            tokio::time::sleep(Duration::from_millis((until - now) as u64)).await;
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

/// `Retry-After` header (seconds, per HTTP spec) takes priority over the
/// JSON body's `retry_after` field; default 1000ms if neither is present.
fn retry_after_ms(headers: &HeaderMap, body: &str) -> i64 {
    if let Some(secs) = parse_header::<f64>(headers, "retry-after") {
        return (secs * 1000.0).round() as i64;
    }
    if let Ok(parsed) = serde_json::from_str::<indexer_types::RateLimitErrorBody>(body) {
        return (parsed.retry_after * 1000.0).round() as i64;
    }
    DEFAULT_RETRY_AFTER_MS
}

fn body_says_global(body: &str) -> bool {
    serde_json::from_str::<indexer_types::RateLimitErrorBody>(body)
        .map(|b| b.global)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(
                reqwest::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        h
    }

    #[test]
    fn retry_after_prefers_header_over_body() {
        let h = headers(&[("retry-after", "2")]);
        let ms = retry_after_ms(&h, r#"{"retry_after":9.0}"#);
        assert_eq!(ms, 2000);
    }

    #[test]
    fn retry_after_falls_back_to_body() {
        let h = headers(&[]);
        let ms = retry_after_ms(&h, r#"{"retry_after":1.5,"global":true}"#);
        assert_eq!(ms, 1500);
    }

    #[test]
    fn retry_after_defaults_when_absent() {
        let h = headers(&[]);
        let ms = retry_after_ms(&h, "not json");
        assert_eq!(ms, DEFAULT_RETRY_AFTER_MS);
    }

    #[test]
    fn global_flag_detected_from_body() {
        assert!(body_says_global(r#"{"retry_after":1.0,"global":true}"#));
        assert!(!body_says_global(r#"{"retry_after":1.0,"global":false}"#));
        assert!(!body_says_global("garbage"));
    }

    #[tokio::test]
    async fn acquire_serializes_same_bucket() {
        let limiter = Arc::new(RateLimiter::new());
        let lease1 = limiter.acquire("GET:/a").await;

        let limiter2 = limiter.clone();
        let second = tokio::spawn(async move {
            let _lease2 = limiter2.acquire("GET:/a").await;
        });

        // The second acquire must still be pending while the first lease
        // is held for the same (unlearned) bucket.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(lease1);
        second.await.expect("second acquire completes after release");
    }

    #[tokio::test]
    async fn learned_bucket_is_shared_across_routes() {
        let limiter = RateLimiter::new();
        let lease = limiter.acquire("GET:/a").await;
        let h = headers(&[("x-ratelimit-bucket", "shared")]);
        limiter.observe(&lease, 200, &h, "{}");
        drop(lease);

        let lease_a = limiter.acquire("GET:/a").await;
        assert_eq!(lease_a.bucket_key, "shared");
    }
}
