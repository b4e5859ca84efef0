#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to decode gateway frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("gateway connection closed")]
    Closed,
}

pub type Result<T, E = GatewayError> = core::result::Result<T, E>;
