//! Turning URLs into notifiers and config sources.
//!
//! Instantiation is a two-layer parse: the generic grammar from
//! `herald-url` first, then the owning plugin's own `parse_url`, which
//! knows what the path and query mean for that backend. Caller-supplied
//! overrides (tags, cache, recursion, insecure includes, asset) are merged
//! afterwards and always win over anything embedded in the URL.

use std::collections::BTreeMap;
use std::sync::Arc;

use herald_url::{FILE_SCHEMA, ParsedUrl, schema_of};
use tracing::{debug, warn};

use crate::asset::Asset;
use crate::config::{CachePolicy, ConfigFormat, ConfigSource, SourceOptions};
use crate::notify::Notify;
use crate::privacy::redact_url;
use crate::registry::{PluginKind, SchemeRegistry};
use crate::tag::Tags;
use crate::{Error, Result};

/// A value produced by a plugin's `parse_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
    Flag(bool),
}

/// Backend-specific parameters extracted from a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<&'static str, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, ParamValue::Text(value.into()));
    }

    pub fn set_list(&mut self, key: &'static str, values: Vec<String>) {
        self.values.insert(key, ParamValue::List(values));
    }

    pub fn set_flag(&mut self, key: &'static str, value: bool) {
        self.values.insert(key, ParamValue::Flag(value));
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(ParamValue::List(values)) => values,
            _ => &[],
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ParamValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Everything a plugin constructor receives.
#[derive(Debug, Clone)]
pub struct UrlArgs {
    /// The generic parse of the URL, overrides applied.
    pub url: ParsedUrl,
    /// Whether the URL used the plugin's secure scheme.
    pub secure: bool,
    /// Output of the plugin's `parse_url`.
    pub params: Params,
    pub tags: Tags,
    pub asset: Asset,
    pub cache: CachePolicy,
    pub recursion: u32,
    pub insecure_includes: bool,
}

/// Caller-controlled values merged into every instantiation.
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    pub tags: Tags,
    pub asset: Asset,
    /// `None` keeps the source default ([`CachePolicy::Forever`]).
    pub cache: Option<CachePolicy>,
    pub recursion: u32,
    pub insecure_includes: bool,
    /// Forced format for config sources; auto-detected when `None`.
    pub format: Option<ConfigFormat>,
    /// Extra query values applied over the URL's own (per-entry overrides
    /// from structured config documents).
    pub query: Vec<(String, String)>,
}

impl InstantiateOptions {
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// Result of a successful instantiation.
#[derive(Debug)]
pub enum Instance {
    Notify(Arc<dyn Notify>),
    Config(ConfigSource),
}

/// Query keys that only the caller may set.
const RESERVED_KEYS: &[&str] = &["cache", "recursion", "insecure_includes"];

/// Instantiates `url`, propagating every failure.
pub fn try_instantiate(
    registry: &Arc<SchemeRegistry>,
    url: &str,
    options: &InstantiateOptions,
) -> Result<Instance> {
    let schema = schema_of(url).unwrap_or_else(|| FILE_SCHEMA.to_string());
    let descriptor = *registry.lookup(&schema)?;

    let parsed = ParsedUrl::parse(url)?
        .with_query(options.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    // Never honored from the URL itself.
    if RESERVED_KEYS.iter().any(|key| parsed.query().contains(key)) {
        debug!(schema = %schema, "Ignoring reserved query keys embedded in URL");
    }
    let parsed = parsed.without_query(RESERVED_KEYS.iter().copied());

    let params = (descriptor.parse_url)(&parsed)?;

    let args = UrlArgs {
        url: parsed,
        secure: descriptor.is_secure(),
        params,
        tags: options.tags.clone(),
        asset: options.asset.clone(),
        cache: options.cache.unwrap_or_default(),
        recursion: options.recursion,
        insecure_includes: options.insecure_includes,
    };

    match descriptor.kind {
        PluginKind::Notify { build } => build(args).map(Instance::Notify),
        PluginKind::Config { build, .. } => {
            let origin = build(&args)?;
            let format = options
                .format
                .or_else(|| args.params.text("format").and_then(|f| f.parse().ok()));
            Ok(Instance::Config(ConfigSource::new(
                origin,
                Arc::clone(registry),
                SourceOptions {
                    tags: args.tags,
                    asset: args.asset,
                    cache: args.cache,
                    recursion: args.recursion,
                    insecure_includes: args.insecure_includes,
                    format,
                },
            )))
        }
    }
}

/// Instantiates `url`, logging any failure and returning `None` instead.
pub fn instantiate(
    registry: &Arc<SchemeRegistry>,
    url: &str,
    options: &InstantiateOptions,
) -> Option<Instance> {
    match try_instantiate(registry, url, options) {
        Ok(instance) => Some(instance),
        Err(Error::UnknownScheme(schema)) => {
            warn!(schema = %schema, url = %redact_url(url), "Unsupported schema");
            None
        }
        Err(Error::InvalidUrl(error)) => {
            warn!(url = %redact_url(url), error = %error, "Unparseable URL");
            None
        }
        Err(error) => {
            warn!(url = %redact_url(url), error = %error, "Could not load URL");
            None
        }
    }
}

/// Instantiates a notifier; config URLs are rejected.
pub fn instantiate_notify(
    registry: &Arc<SchemeRegistry>,
    url: &str,
    options: &InstantiateOptions,
) -> Option<Arc<dyn Notify>> {
    match instantiate(registry, url, options)? {
        Instance::Notify(notifier) => Some(notifier),
        Instance::Config(_) => {
            warn!(url = %redact_url(url), "Expected a notification URL, got a config URL");
            None
        }
    }
}

/// Instantiates a config source; notification URLs are rejected.
pub fn instantiate_config(
    registry: &Arc<SchemeRegistry>,
    url: &str,
    options: &InstantiateOptions,
) -> Option<ConfigSource> {
    match instantiate(registry, url, options)? {
        Instance::Config(source) => Some(source),
        Instance::Notify(_) => {
            warn!(url = %redact_url(url), "Expected a config URL, got a notification URL");
            None
        }
    }
}
