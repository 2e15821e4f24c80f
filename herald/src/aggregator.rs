//! Ordered collections of config sources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::asset::Asset;
use crate::config::memory::MemoryOrigin;
use crate::config::{CachePolicy, ConfigFormat, ConfigSource, SourceOptions, detect_format};
use crate::factory::{InstantiateOptions, instantiate_config};
use crate::notify::Notify;
use crate::privacy::redact_url;
use crate::registry::SchemeRegistry;
use crate::tag::{MATCH_ALL_TAG, MATCH_ALWAYS_TAG, TagFilter, Tags, matches};
use crate::{Error, Result};

/// Something [`ConfigSet::add`] accepts.
#[derive(Debug)]
pub enum ConfigInput {
    /// A config URL or local path.
    Url(String),
    /// A source built elsewhere; added as-is.
    Source(ConfigSource),
}

impl From<&str> for ConfigInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for ConfigInput {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<ConfigSource> for ConfigInput {
    fn from(source: ConfigSource) -> Self {
        Self::Source(source)
    }
}

/// Per-call overrides for [`ConfigSet::add`] and [`ConfigSet::add_config`].
/// Unset values fall back to the set's defaults.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub tags: Tags,
    pub asset: Option<Asset>,
    pub cache: Option<CachePolicy>,
    pub recursion: Option<u32>,
    pub insecure_includes: Option<bool>,
}

impl AddOptions {
    pub fn tagged(tags: Tags) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }
}

/// An ordered list of config sources, flattened into one notifier list on
/// demand. Duplicates are allowed.
#[derive(Debug)]
pub struct ConfigSet {
    registry: Arc<SchemeRegistry>,
    configs: Vec<ConfigSource>,
    asset: Asset,
    cache: CachePolicy,
    recursion: u32,
    insecure_includes: bool,
}

impl Default for ConfigSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSet {
    /// An empty set using the built-in scheme registry.
    pub fn new() -> Self {
        Self::with_registry(SchemeRegistry::global())
    }

    pub fn with_registry(registry: Arc<SchemeRegistry>) -> Self {
        Self {
            registry,
            configs: Vec::new(),
            asset: Asset::default(),
            cache: CachePolicy::default(),
            recursion: 0,
            insecure_includes: false,
        }
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.asset = asset;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_recursion(mut self, recursion: u32) -> Self {
        self.recursion = recursion;
        self
    }

    pub fn with_insecure_includes(mut self, insecure_includes: bool) -> Self {
        self.insecure_includes = insecure_includes;
        self
    }

    pub fn registry(&self) -> &Arc<SchemeRegistry> {
        &self.registry
    }

    /// Adds config sources.
    ///
    /// Every element is attempted; the result is `false` if any of them
    /// could not be turned into a config source.
    pub fn add<I, T>(&mut self, inputs: I, options: &AddOptions) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Into<ConfigInput>,
    {
        let instantiate_options = InstantiateOptions {
            tags: options.tags.clone(),
            asset: options.asset.clone().unwrap_or_else(|| self.asset.clone()),
            cache: Some(options.cache.unwrap_or(self.cache)),
            recursion: options.recursion.unwrap_or(self.recursion),
            insecure_includes: options.insecure_includes.unwrap_or(self.insecure_includes),
            ..InstantiateOptions::default()
        };

        let mut status = true;
        for input in inputs {
            match input.into() {
                ConfigInput::Source(source) => self.configs.push(source),
                ConfigInput::Url(url) => {
                    debug!(url = %redact_url(&url), "Loading configuration");
                    match instantiate_config(&self.registry, &url, &instantiate_options) {
                        Some(source) => self.configs.push(source),
                        None => status = false,
                    }
                }
            }
        }
        status
    }

    /// Adds raw config content as an in-memory source.
    ///
    /// Fails when no `format` is given and none can be detected.
    pub fn add_config(
        &mut self,
        content: &str,
        format: Option<ConfigFormat>,
        options: &AddOptions,
    ) -> bool {
        let Some(format) = format.or_else(|| detect_format(content)) else {
            warn!("The format of the configuration could not be detected");
            return false;
        };
        debug!(format = %format, bytes = content.len(), "Loading raw configuration");

        self.configs.push(ConfigSource::new(
            Box::new(MemoryOrigin::new(content, Some(format))),
            Arc::clone(&self.registry),
            SourceOptions {
                tags: options.tags.clone(),
                asset: options.asset.clone().unwrap_or_else(|| self.asset.clone()),
                cache: options.cache.unwrap_or(self.cache),
                recursion: options.recursion.unwrap_or(self.recursion),
                insecure_includes: options.insecure_includes.unwrap_or(self.insecure_includes),
                format: Some(format),
            },
        ));
        true
    }

    /// Notifiers of every source whose own tags satisfy `filter`, in
    /// insertion order.
    ///
    /// The filter selects sources, not the notifiers inside them.
    pub async fn servers(&mut self, filter: &TagFilter, match_always: bool) -> Vec<Arc<dyn Notify>> {
        let match_always = match_always.then_some(MATCH_ALWAYS_TAG);
        let mut response = Vec::new();
        for source in &mut self.configs {
            if matches(filter, source.tags(), MATCH_ALL_TAG, match_always) {
                response.extend(source.servers().await);
            }
        }
        response
    }

    /// Removes and returns the source at `index`.
    pub fn pop(&mut self, index: usize) -> Result<ConfigSource> {
        if index >= self.configs.len() {
            return Err(Error::out_of_bounds(index, self.configs.len()));
        }
        Ok(self.configs.remove(index))
    }

    /// Removes and returns the notifier at `index` of the flattened list of
    /// every source, loading sources as needed.
    pub async fn server_pop(&mut self, index: usize) -> Result<Arc<dyn Notify>> {
        let mut offset = 0;
        for source in &mut self.configs {
            let count = source.servers_with(CachePolicy::Forever).await.len();
            if index < offset + count {
                return source.pop(index - offset).await;
            }
            offset += count;
        }
        Err(Error::out_of_bounds(index, offset))
    }

    pub fn clear(&mut self) {
        self.configs.clear();
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConfigSource> {
        self.configs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ConfigSource> {
        self.configs.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigSource> {
        self.configs.iter()
    }
}
