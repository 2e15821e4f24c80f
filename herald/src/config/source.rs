//! A single config source and its cache.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use herald_url::{FILE_SCHEMA, schema_of};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    CachePolicy, ConfigFormat, ConfigOrigin, IncludeDirective, IncludeMode, SourceState,
    detect_format, parse_text, parse_yaml,
};
use crate::asset::Asset;
use crate::factory::{InstantiateOptions, instantiate_config, instantiate_notify};
use crate::notify::Notify;
use crate::registry::{PluginKind, SchemeRegistry};
use crate::tag::Tags;
use crate::{Error, Result};

/// Settings a source is created with.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub tags: Tags,
    pub asset: Asset,
    pub cache: CachePolicy,
    /// How many levels of imports are still followed.
    pub recursion: u32,
    pub insecure_includes: bool,
    /// Forced document format; auto-detected when `None`.
    pub format: Option<ConfigFormat>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    servers: Vec<Arc<dyn Notify>>,
    fetched_at: Instant,
}

impl CacheEntry {
    fn new(servers: Vec<Arc<dyn Notify>>) -> Self {
        Self {
            servers,
            fetched_at: Instant::now(),
        }
    }
}

/// One origin of notification URLs.
///
/// Loading happens lazily on the first call to [`ConfigSource::servers`]
/// and is repeated according to the cache policy. Every failure is logged
/// and degrades to an empty list for this source only.
#[derive(Debug)]
pub struct ConfigSource {
    origin: Box<dyn ConfigOrigin>,
    registry: Arc<SchemeRegistry>,
    options: SourceOptions,
    state: SourceState,
    cached: Option<CacheEntry>,
}

impl ConfigSource {
    pub fn new(
        origin: Box<dyn ConfigOrigin>,
        registry: Arc<SchemeRegistry>,
        options: SourceOptions,
    ) -> Self {
        Self {
            origin,
            registry,
            options,
            state: SourceState::Unloaded,
            cached: None,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn tags(&self) -> &Tags {
        &self.options.tags
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.options.cache
    }

    pub fn recursion(&self) -> u32 {
        self.options.recursion
    }

    pub fn insecure_includes(&self) -> bool {
        self.options.insecure_includes
    }

    pub fn format(&self) -> Option<ConfigFormat> {
        self.options.format
    }

    pub fn origin(&self) -> &dyn ConfigOrigin {
        self.origin.as_ref()
    }

    /// URL of the origin, with the forced format if any.
    pub fn url(&self, privacy: bool) -> String {
        let url = self.origin.url(privacy);
        match self.options.format {
            Some(format) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}format={format}")
            }
            None => url,
        }
    }

    /// Number of notifiers currently cached, without loading.
    pub fn cached_len(&self) -> Option<usize> {
        self.cached.as_ref().map(|entry| entry.servers.len())
    }

    /// Notifiers of this source under its own cache policy.
    pub async fn servers(&mut self) -> Vec<Arc<dyn Notify>> {
        let cache = self.options.cache;
        self.servers_with(cache).await
    }

    /// Notifiers of this source, judging the cached result by `cache`
    /// instead of the source's own policy.
    pub fn servers_with(&mut self, cache: CachePolicy) -> BoxFuture<'_, Vec<Arc<dyn Notify>>> {
        async move {
            if let Some(entry) = &self.cached
                && cache.is_fresh(entry.fetched_at)
            {
                return entry.servers.clone();
            }

            self.state = SourceState::Fetching;
            match self.load().await {
                Ok(servers) => {
                    self.state = SourceState::Loaded;
                    self.cached = Some(CacheEntry::new(servers.clone()));
                    servers
                }
                Err(error) => {
                    warn!(
                        url = %self.origin.url(true),
                        error = %error,
                        "Failed to load configuration"
                    );
                    match &self.cached {
                        Some(entry) => {
                            self.state = SourceState::Loaded;
                            entry.servers.clone()
                        }
                        None => {
                            self.state = SourceState::Failed;
                            Vec::new()
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Removes and returns the notifier at `index` of the cached list,
    /// loading first if nothing is cached.
    pub async fn pop(&mut self, index: usize) -> Result<Arc<dyn Notify>> {
        if self.cached.is_none() {
            self.servers().await;
        }
        let servers = self
            .cached
            .as_mut()
            .map(|entry| &mut entry.servers)
            .ok_or_else(|| Error::out_of_bounds(index, 0))?;
        if index >= servers.len() {
            return Err(Error::out_of_bounds(index, servers.len()));
        }
        Ok(servers.remove(index))
    }

    /// Drops the cached result; the next call fetches again.
    pub fn expire(&mut self) {
        self.cached = None;
        self.state = SourceState::Unloaded;
    }

    async fn load(&self) -> Result<Vec<Arc<dyn Notify>>> {
        let content = self.origin.read().await?;
        let format = self
            .options
            .format
            .or(content.format)
            .or_else(|| detect_format(&content.text))
            .ok_or(Error::FormatUndetected)?;

        let parsed = match format {
            ConfigFormat::Text => parse_text(&content.text)?,
            ConfigFormat::Yaml => parse_yaml(&content.text)?,
        };

        let mut asset = self.options.asset.clone();
        asset.apply_overrides(parsed.asset.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut servers = Vec::with_capacity(parsed.entries.len());
        for entry in &parsed.entries {
            let options = InstantiateOptions {
                tags: self.options.tags.union(&entry.tags).cloned().collect(),
                asset: asset.clone(),
                query: entry.overrides.clone(),
                ..InstantiateOptions::default()
            };
            if let Some(notifier) = instantiate_notify(&self.registry, &entry.url, &options) {
                servers.push(notifier);
            }
        }

        if !parsed.includes.is_empty() {
            if self.options.recursion == 0 {
                debug!(
                    url = %self.origin.url(true),
                    skipped = parsed.includes.len(),
                    "Recursion budget exhausted; ignoring imports"
                );
            } else {
                for include in &parsed.includes {
                    servers.extend(self.follow(include, &asset).await);
                }
            }
        }

        if servers.is_empty() {
            warn!(url = %self.origin.url(true), "No notification URLs loaded from configuration");
        } else {
            info!(
                url = %self.origin.url(true),
                format = %format,
                count = servers.len(),
                "Loaded configuration"
            );
        }

        Ok(servers)
    }

    async fn follow(&self, include: &IncludeDirective, asset: &Asset) -> Vec<Arc<dyn Notify>> {
        let target = self.origin.resolve(&include.url);
        let scheme = schema_of(&target).unwrap_or_else(|| FILE_SCHEMA.to_string());

        let include_mode = match self.registry.lookup(&scheme).map(|d| d.kind) {
            Ok(PluginKind::Config { include_mode, .. }) => include_mode,
            Ok(PluginKind::Notify { .. }) => {
                warn!(scheme = %scheme, "Import target is not a configuration source");
                return Vec::new();
            }
            Err(_) => {
                warn!(scheme = %scheme, "Unsupported import scheme");
                return Vec::new();
            }
        };

        let allowed = match include_mode {
            IncludeMode::Never => false,
            IncludeMode::Always => true,
            IncludeMode::Strict => {
                self.options.insecure_includes
                    || self.registry.canonical_scheme(&scheme)
                        == self.registry.canonical_scheme(self.origin.schema())
            }
        };
        if !allowed {
            warn!(
                from = %self.origin.schema(),
                to = %scheme,
                "Refusing to import configuration across schemes"
            );
            return Vec::new();
        }

        let options = InstantiateOptions {
            tags: self.options.tags.union(&include.tags).cloned().collect(),
            asset: asset.clone(),
            cache: Some(self.options.cache),
            recursion: self.options.recursion - 1,
            insecure_includes: self.options.insecure_includes,
            ..InstantiateOptions::default()
        };

        match instantiate_config(&self.registry, &target, &options) {
            Some(mut source) => source.servers().await,
            None => Vec::new(),
        }
    }
}
