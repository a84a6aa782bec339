//! Error types shared by the store adapters, the splitter and the header composer.

use thiserror::Error;

/// Failures reported by an [`ObjectBackend`](crate::cadapter::client::ObjectBackend).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed: {message}")]
    Backend { op: &'static str, message: String },
}

impl StoreError {
    pub fn backend(op: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Backend {
            op,
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("invalid byte range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },

    /// A single line spans the whole searchable window, so no cut point exists.
    #[error("no line break found between offsets {lower} and {upper}")]
    NoLineBreakFound { lower: u64, upper: u64 },

    #[error("invalid split configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("source object does not exist: {0}")]
    MissingSource(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
