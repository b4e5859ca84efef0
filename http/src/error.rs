/// Errors surfaced by the rate-limited REST client.
///
/// The coordinator itself never retries (§4.A failure policy): a
/// non-2xx status, including 429, is not an error here — it travels
/// back as a successfully-observed [`crate::RateLimitedResponse`] for
/// the caller to interpret. Every variant below is instead a failure
/// the client itself cannot recover from.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("bot token is not a valid HTTP header value: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T, E = HttpError> = core::result::Result<T, E>;
