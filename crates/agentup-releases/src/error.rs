//! Error types for release resolution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed release payload: {0}")]
    Malformed(String),

    #[error("release io error: {0}")]
    Io(#[from] std::io::Error),
}
