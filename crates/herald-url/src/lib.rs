//! URL grammar for notification and configuration URLs.
//!
//! Every herald target is described by a URL such as
//! `mmost://bot@chat.example.com:8065/path/TOKEN?channel=ops`. This crate
//! turns such strings into a [`ParsedUrl`] without knowing anything about
//! the backend that will eventually consume it; backend-specific meaning
//! (which path segment is a token, which query keys are lists) is layered on
//! top by the consumer.
//!
//! Strings without a `scheme://` prefix are treated as local file paths and
//! parsed under the [`FILE_SCHEMA`] scheme.

mod error;
mod parse;
mod query;
mod util;

pub use error::UrlError;
pub use parse::{FILE_SCHEMA, ParsedUrl, schema_of};
pub use query::QueryParams;
pub use util::{parse_bool, parse_list, quote, split_path, unquote};
