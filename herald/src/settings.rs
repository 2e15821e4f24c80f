//! Process-level defaults for the dispatcher.

use serde::{Deserialize, Deserializer};

use crate::asset::Asset;
use crate::config::CachePolicy;
use crate::tag::TagFilter;
use crate::{Error, Result};
use herald_url::parse_bool;

/// Defaults applied to every config source and notifier the binary builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "deserialize_cache")]
    pub cache: CachePolicy,
    pub recursion: u32,
    pub insecure_includes: bool,
    pub asset: Asset,
    /// Tracing filter directive; `RUST_LOG` still takes precedence.
    pub log_filter: Option<String>,
    /// Config origins to load.
    pub config: Vec<String>,
    /// Notification URLs added directly; whitespace separated in the
    /// environment since URLs may contain commas.
    pub urls: Vec<String>,
    pub title: String,
    /// Comma-separated tags to notify; everything when unset.
    pub tag: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CachePolicy::default(),
            recursion: 0,
            insecure_includes: false,
            asset: Asset::default(),
            log_filter: None,
            config: Vec::new(),
            urls: Vec::new(),
            title: String::new(),
            tag: None,
        }
    }
}

impl Settings {
    /// Reads `HERALD_*` environment variables. Call after `dotenvy` has
    /// loaded any `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(cache) = lookup("HERALD_CACHE") {
            settings.cache = cache.parse()?;
        }
        if let Some(recursion) = lookup("HERALD_RECURSION") {
            settings.recursion = recursion
                .trim()
                .parse()
                .map_err(|_| Error::malformed(format!("invalid HERALD_RECURSION: {recursion}")))?;
        }
        if let Some(insecure) = lookup("HERALD_INSECURE_INCLUDES") {
            settings.insecure_includes = parse_bool(&insecure, false);
        }
        if let Some(app_id) = lookup("HERALD_APP_ID") {
            settings.asset.app_id = app_id;
        }
        settings.log_filter = lookup("HERALD_LOG");
        if let Some(config) = lookup("HERALD_CONFIG") {
            settings.config = split_origins(&config);
        }
        if let Some(urls) = lookup("HERALD_URLS") {
            settings.urls = urls.split_whitespace().map(str::to_string).collect();
        }
        if let Some(title) = lookup("HERALD_TITLE") {
            settings.title = title;
        }
        settings.tag = lookup("HERALD_TAG").filter(|tag| !tag.trim().is_empty());

        Ok(settings)
    }

    pub fn tag_filter(&self) -> TagFilter {
        self.tag
            .as_deref()
            .map(TagFilter::parse)
            .unwrap_or_default()
    }
}

/// Config origins are comma separated; paths may contain spaces.
fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_cache<'de, D>(deserializer: D) -> std::result::Result<CachePolicy, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CacheValue {
        Flag(bool),
        Seconds(u64),
        Text(String),
    }

    match CacheValue::deserialize(deserializer)? {
        CacheValue::Flag(enabled) => Ok(enabled.into()),
        CacheValue::Seconds(secs) => Ok(secs.into()),
        CacheValue::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}
