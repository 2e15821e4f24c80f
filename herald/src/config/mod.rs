//! Configuration sources.
//!
//! A config source is one origin (a local file, an HTTP endpoint, an
//! in-memory string) holding notification URLs in either the line-based
//! text format or the structured YAML format. Sources cache what they
//! loaded according to their [`CachePolicy`] and may import further
//! sources, bounded by a recursion budget.

pub mod file;
pub mod format;
pub mod http;
pub mod memory;
mod source;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{Error, Result};

pub use format::{ConfigEntry, IncludeDirective, ParsedConfig, detect_format, parse_text, parse_yaml};
pub use source::{ConfigSource, SourceOptions};

/// How long loaded results are reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Fetch on every call.
    Disabled,
    /// Fetch once and keep the result.
    #[default]
    Forever,
    /// Reuse until the duration has elapsed since the last fetch.
    Ttl(Duration),
}

impl CachePolicy {
    /// Whether a result fetched at `fetched_at` may still be served.
    pub fn is_fresh(&self, fetched_at: Instant) -> bool {
        match self {
            Self::Disabled => false,
            Self::Forever => true,
            Self::Ttl(ttl) => !ttl.is_zero() && Instant::now() < fetched_at + *ttl,
        }
    }
}

impl From<bool> for CachePolicy {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Forever } else { Self::Disabled }
    }
}

/// Seconds; zero disables caching.
impl From<u64> for CachePolicy {
    fn from(secs: u64) -> Self {
        if secs == 0 {
            Self::Disabled
        } else {
            Self::Ttl(Duration::from_secs(secs))
        }
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    /// Accepts `yes`/`no` style booleans or a number of seconds.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(secs.into());
        }
        match s.to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "forever" => Ok(Self::Forever),
            "no" | "false" | "off" => Ok(Self::Disabled),
            other => Err(Error::malformed(format!("invalid cache policy: {other}"))),
        }
    }
}

/// Whether a source kind may be imported by another source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeMode {
    /// Never importable.
    Never,
    /// Importable from a source of the same scheme class, or from any
    /// source when insecure includes are enabled.
    Strict,
    /// Importable from anywhere.
    Always,
}

/// Document format of a config source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Text,
    Yaml,
}

impl ConfigFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::malformed(format!("unknown config format: {other}"))),
        }
    }
}

/// Lifecycle of a [`ConfigSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unloaded,
    Fetching,
    Loaded,
    /// Every fetch so far failed.
    Failed,
}

/// Raw document read from an origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigContent {
    pub text: String,
    /// Format implied by the origin (file extension, content type).
    pub format: Option<ConfigFormat>,
}

impl ConfigContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: Option<ConfigFormat>) -> Self {
        self.format = format;
        self
    }
}

/// Where a config document comes from.
#[async_trait]
pub trait ConfigOrigin: Send + Sync + fmt::Debug {
    /// The scheme this origin was created from.
    fn schema(&self) -> &str;

    async fn read(&self) -> Result<ConfigContent>;

    /// URL of the origin; credentials masked when `privacy`.
    fn url(&self, privacy: bool) -> String;

    /// Resolves an import reference found in this origin's document.
    /// References with a scheme are returned unchanged.
    fn resolve(&self, reference: &str) -> String {
        reference.to_string()
    }
}
