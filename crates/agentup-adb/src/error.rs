//! Error types for the adb backend.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdbError {
    #[error("adb command failed: {0}")]
    CommandFailed(String),

    #[error("adb command timed out after {0:?}")]
    Timeout(Duration),

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("adb io error: {0}")]
    Io(#[from] std::io::Error),
}
