//! Error types for entropack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("invalid archive format: {0}")]
    Format(String),

    #[error("archive is password protected and the password is missing or wrong")]
    AccessDenied,

    #[error("entry {0:?} not found in archive")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// True for the clean-abort outcome, which callers treat separately
    /// from real failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompressError::Cancelled)
    }
}
