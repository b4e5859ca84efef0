use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error for the supervisor's startup sequence (§4.F). Only
/// the `Config` variant is expected to actually occur in practice —
/// `ensure_indexes`/`Client::new` failures are store/transport setup
/// errors that would also abort the process, but are rare enough in
/// the startup path that call sites still log them individually.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] indexer_http::HttpError),
    #[error(transparent)]
    Store(#[from] indexer_store::StoreError),
}

pub type Result<T, E = CoreError> = core::result::Result<T, E>;
