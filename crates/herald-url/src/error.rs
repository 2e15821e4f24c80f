use thiserror::Error;

/// Errors produced while parsing a URL.
///
/// Messages never echo the full URL back since it may carry credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("empty url")]
    Empty,
    #[error("missing host for {schema}:// url")]
    MissingHost { schema: String },
    #[error("invalid port `{port}`")]
    InvalidPort { port: String },
    #[error("invalid percent-encoding in `{0}`")]
    InvalidEncoding(String),
}
