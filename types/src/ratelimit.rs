use serde::{Deserialize, Serialize};

/// Body of a `429 Too Many Requests` response (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitErrorBody {
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a generic upstream API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}
