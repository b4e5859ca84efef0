use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::error::HttpError;
use crate::rate_limit::{RateLimitSignal, RateLimiter};

/// Result of a single GET through the coordinator: the raw status/body
/// plus what the bucket's own response headers said about pacing
/// (§4.A step 6 observation rules, surfaced to the caller for §4.D's
/// outcome handling).
#[derive(Debug, Clone)]
pub struct RateLimitedResponse {
    pub status: u16,
    pub body: String,
    pub rate_limit: RateLimitSignal,
}

impl RateLimitedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(HttpError::Decode)
    }
}

/// A shared HTTP client wrapping `reqwest` with the rate-limit
/// coordinator from §4.A. One instance is shared by the supervisor, all
/// backfill workers, and the guild/channel enumeration calls (§5).
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    auth_header: HeaderValue,
    limiter: RateLimiter,
}

impl Client {
    /// The bot token is folded into a header value once here, rather
    /// than re-parsed on every request: a token with a stray byte
    /// invalid in an HTTP header (copy-paste whitespace, non-ASCII)
    /// is a startup-time config error (§7), not a panic to hit deep
    /// in steady-state operation.
    pub fn new(base_url: impl Into<String>, bot_token: &str) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder().build()?;
        let auth_header = HeaderValue::from_str(&format!("Bot {bot_token}"))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            auth_header,
            limiter: RateLimiter::new(),
        })
    }

    /// `GET` contract of §4.A: `get(url, route_key) -> response`.
    ///
    /// `path` is the concrete request path (with real ids substituted);
    /// `route_key` is the endpoint-shape template used to find the
    /// bucket before its id is known (e.g.
    /// `"GET:/channels/:channelId/messages"`).
    pub async fn get(&self, path: &str, route_key: &str) -> Result<RateLimitedResponse, HttpError> {
        let lease = self.limiter.acquire(route_key).await;

        let url = format!("{}{}", self.base_url, path);
        debug!(route = route_key, url = %url, "issuing GET");

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth_header.clone());

        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        let rate_limit = self.limiter.observe(&lease, status, &response_headers, &body);
        drop(lease);

        Ok(RateLimitedResponse {
            status,
            body,
            rate_limit,
        })
    }
}
