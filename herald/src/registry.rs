//! Scheme registry.
//!
//! Maps a URL scheme to the plugin that understands it. The built-in table
//! is assembled once on first use and shared; callers that need extra
//! schemes (tests, embedders with private backends) build their own
//! registry from [`SchemeRegistry::builtin`] and pass it around by `Arc`.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::config::{ConfigOrigin, IncludeMode, file, http, memory};
use crate::factory::{Params, UrlArgs};
use crate::notify::{Notify, json, mattermost, pushjet};
use crate::{Error, Result};
use herald_url::ParsedUrl;

/// Backend-specific URL refinement, layered on top of the generic parse.
pub type UrlParser = fn(&ParsedUrl) -> Result<Params>;

/// Builds a notifier from refined arguments.
pub type NotifyBuilder = fn(UrlArgs) -> Result<Arc<dyn Notify>>;

/// Builds a config origin from refined arguments.
pub type ConfigBuilder = fn(&UrlArgs) -> Result<Box<dyn ConfigOrigin>>;

/// What a scheme constructs.
#[derive(Debug, Clone, Copy)]
pub enum PluginKind {
    Notify {
        build: NotifyBuilder,
    },
    Config {
        build: ConfigBuilder,
        /// Whether other config sources may import this kind of source.
        include_mode: IncludeMode,
    },
}

/// A plugin definition as shipped by a backend module.
#[derive(Debug, Clone, Copy)]
pub struct PluginEntry {
    pub service_name: &'static str,
    pub schema: &'static str,
    pub secure_schema: Option<&'static str>,
    pub parse_url: UrlParser,
    pub kind: PluginKind,
}

/// Registration of one scheme.
#[derive(Debug, Clone, Copy)]
pub struct SchemeDescriptor {
    pub service_name: &'static str,
    pub parse_url: UrlParser,
    pub kind: PluginKind,
    /// Set on secure aliases: the insecure scheme they share a schema with.
    pub secure_variant_of: Option<&'static str>,
}

impl SchemeDescriptor {
    pub fn is_config_source(&self) -> bool {
        matches!(self.kind, PluginKind::Config { .. })
    }

    pub fn is_secure(&self) -> bool {
        self.secure_variant_of.is_some()
    }

    /// The insecure scheme this registration belongs to; two schemes with
    /// the same canonical scheme are of the same class.
    pub fn canonical_scheme<'a>(&'a self, scheme: &'a str) -> &'a str {
        self.secure_variant_of.unwrap_or(scheme)
    }
}

static BUILTIN_PLUGINS: &[&PluginEntry] = &[
    &mattermost::PLUGIN,
    &pushjet::PLUGIN,
    &json::PLUGIN,
    &file::PLUGIN,
    &memory::PLUGIN,
    &http::PLUGIN,
];

static GLOBAL_REGISTRY: LazyLock<Arc<SchemeRegistry>> =
    LazyLock::new(|| Arc::new(SchemeRegistry::builtin()));

/// Scheme -> plugin map. Scheme strings are case-folded.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    schemes: BTreeMap<String, SchemeDescriptor>,
}

impl SchemeRegistry {
    /// A registry without any scheme.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh registry holding every built-in plugin.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for plugin in BUILTIN_PLUGINS {
            registry.register_plugin(plugin);
        }
        registry
    }

    /// The process-wide built-in registry, built on first call.
    pub fn global() -> Arc<SchemeRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Registers a plugin under its scheme and, if it has one, its secure
    /// scheme.
    pub fn register_plugin(&mut self, plugin: &PluginEntry) {
        self.register(
            plugin.schema,
            SchemeDescriptor {
                service_name: plugin.service_name,
                parse_url: plugin.parse_url,
                kind: plugin.kind,
                secure_variant_of: None,
            },
        );
        if let Some(secure) = plugin.secure_schema {
            self.register(
                secure,
                SchemeDescriptor {
                    service_name: plugin.service_name,
                    parse_url: plugin.parse_url,
                    kind: plugin.kind,
                    secure_variant_of: Some(plugin.schema),
                },
            );
        }
    }

    /// Registers `scheme`, returning the registration it replaced.
    pub fn register(
        &mut self,
        scheme: &str,
        descriptor: SchemeDescriptor,
    ) -> Option<SchemeDescriptor> {
        self.schemes.insert(scheme.to_ascii_lowercase(), descriptor)
    }

    pub fn lookup(&self, scheme: &str) -> Result<&SchemeDescriptor> {
        self.schemes
            .get(&scheme.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.schemes.contains_key(&scheme.to_ascii_lowercase())
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }

    /// Canonical (insecure) scheme of a registered scheme.
    pub fn canonical_scheme(&self, scheme: &str) -> Option<String> {
        let scheme = scheme.to_ascii_lowercase();
        let descriptor = self.schemes.get(&scheme)?;
        Some(descriptor.canonical_scheme(&scheme).to_string())
    }
}
