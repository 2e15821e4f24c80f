//! Config held in memory.
//!
//! Memory sources are created from content handed to
//! [`ConfigSet::add_config`](crate::ConfigSet::add_config); the scheme is
//! registered only so that imports of it can be refused.

use async_trait::async_trait;
use herald_url::ParsedUrl;

use super::{ConfigContent, ConfigFormat, ConfigOrigin, IncludeMode};
use crate::factory::{Params, UrlArgs};
use crate::registry::{PluginEntry, PluginKind};
use crate::{Error, Result};

const SERVICE_NAME: &str = "Memory";

pub const MEMORY_SCHEMA: &str = "memory";

pub(crate) const PLUGIN: PluginEntry = PluginEntry {
    service_name: SERVICE_NAME,
    schema: MEMORY_SCHEMA,
    secure_schema: None,
    parse_url,
    kind: PluginKind::Config {
        build,
        include_mode: IncludeMode::Never,
    },
};

fn parse_url(_url: &ParsedUrl) -> Result<Params> {
    Ok(Params::new())
}

fn build(_args: &UrlArgs) -> Result<Box<dyn ConfigOrigin>> {
    Err(Error::rejected(
        SERVICE_NAME,
        "memory sources are built from content, not URLs",
    ))
}

#[derive(Debug, Clone)]
pub struct MemoryOrigin {
    content: String,
    format: Option<ConfigFormat>,
}

impl MemoryOrigin {
    pub fn new(content: impl Into<String>, format: Option<ConfigFormat>) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[async_trait]
impl ConfigOrigin for MemoryOrigin {
    fn schema(&self) -> &str {
        MEMORY_SCHEMA
    }

    async fn read(&self) -> Result<ConfigContent> {
        Ok(ConfigContent::new(self.content.clone()).with_format(self.format))
    }

    fn url(&self, _privacy: bool) -> String {
        format!("{MEMORY_SCHEMA}://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{InstantiateOptions, try_instantiate};
    use crate::registry::SchemeRegistry;

    #[tokio::test]
    async fn returns_content_verbatim() {
        let origin = MemoryOrigin::new("json://localhost\n", Some(ConfigFormat::Text));
        let content = origin.read().await.unwrap();
        assert_eq!(content.text, "json://localhost\n");
        assert_eq!(content.format, Some(ConfigFormat::Text));
        assert_eq!(origin.url(true), "memory://");
    }

    #[test]
    fn cannot_be_built_from_a_url() {
        let result = try_instantiate(
            &SchemeRegistry::global(),
            "memory://anything",
            &InstantiateOptions::default(),
        );
        assert!(matches!(result, Err(Error::ConstructorRejected { .. })));
    }
}
