use hyper::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failures a viewer expects from a flaky server; absorbed inside the loop.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] hyper::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("stream interrupted after {bytes} bytes: {source}")]
    Interrupted {
        bytes: u64,
        #[source]
        source: hyper::Error,
    },
    #[error("stream stalled after {bytes} bytes (idle {idle:?})")]
    Stalled { bytes: u64, idle: Duration },
    #[error("malformed catalog: {0}")]
    Catalog(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("iteration panicked: {0}")]
    Panicked(String),
}

impl ViewerError {
    /// Transient failures are absorbed inside the loop; the rest trigger the cooldown.
    pub fn is_transient(&self) -> bool {
        matches!(self, ViewerError::Network(_))
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
