//! Crate-wide error types.

use herald_url::UrlError;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Most variants never reach callers of the aggregate APIs: instantiation
/// and config loading log them and degrade to `None`/empty results. Only
/// [`Error::IndexOutOfBounds`] is meant to surface directly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("unsupported scheme: {0}")]
    UnknownScheme(String),

    #[error("{service} rejected its arguments: {reason}")]
    ConstructorRejected {
        service: &'static str,
        reason: String,
    },

    #[error("failed to fetch {origin}: {reason}")]
    FetchFailed { origin: String, reason: String },

    #[error("configuration format could not be detected")]
    FormatUndetected,

    #[error("malformed configuration: {0}")]
    MalformedConfig(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::ConstructorRejected {
            service,
            reason: reason.into(),
        }
    }

    pub fn fetch_failed(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedConfig(msg.into())
    }

    pub fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }
}
