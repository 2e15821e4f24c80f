//! Fan-out of one message to every matching notifier.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregator::ConfigSet;
use crate::asset::Asset;
use crate::factory::{InstantiateOptions, instantiate_notify};
use crate::notify::{Notify, NotifyType};
use crate::registry::SchemeRegistry;
use crate::tag::{TagFilter, Tags};

/// Outcome of [`Herald::notify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchReport {
    /// No notifier matched the filter.
    pub fn nothing_matched(&self) -> bool {
        self.succeeded == 0 && self.failed == 0
    }

    /// At least one notifier was targeted and none failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.nothing_matched()
    }
}

/// Owns directly added notifiers and config sets and sends to them.
#[derive(Debug)]
pub struct Herald {
    registry: Arc<SchemeRegistry>,
    asset: Asset,
    servers: Vec<Arc<dyn Notify>>,
    configs: Vec<ConfigSet>,
}

impl Default for Herald {
    fn default() -> Self {
        Self::new()
    }
}

impl Herald {
    pub fn new() -> Self {
        Self::with_registry(SchemeRegistry::global())
    }

    pub fn with_registry(registry: Arc<SchemeRegistry>) -> Self {
        Self {
            registry,
            asset: Asset::default(),
            servers: Vec::new(),
            configs: Vec::new(),
        }
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.asset = asset;
        self
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Adds notification URLs, each tagged with `tags`. Returns `false` if
    /// any of them could not be instantiated; the others are still added.
    pub fn add<I, S>(&mut self, urls: I, tags: &Tags) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let options = InstantiateOptions {
            tags: tags.clone(),
            asset: self.asset.clone(),
            ..InstantiateOptions::default()
        };

        let mut status = true;
        for url in urls {
            match instantiate_notify(&self.registry, url.as_ref(), &options) {
                Some(notifier) => self.servers.push(notifier),
                None => status = false,
            }
        }
        status
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn Notify>) {
        self.servers.push(notifier);
    }

    pub fn add_config(&mut self, configs: ConfigSet) {
        self.configs.push(configs);
    }

    /// Number of directly added notifiers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.configs.is_empty()
    }

    pub fn clear(&mut self) {
        self.servers.clear();
        self.configs.clear();
    }

    /// Every notifier whose own tags satisfy `filter`, direct ones first.
    pub async fn targets(&mut self, filter: &TagFilter, match_always: bool) -> Vec<Arc<dyn Notify>> {
        let mut targets: Vec<Arc<dyn Notify>> = self
            .servers
            .iter()
            .filter(|notifier| filter.matches(notifier.tags(), match_always))
            .cloned()
            .collect();

        for configs in &mut self.configs {
            targets.extend(
                configs
                    .servers(&TagFilter::all(), true)
                    .await
                    .into_iter()
                    .filter(|notifier| filter.matches(notifier.tags(), match_always)),
            );
        }

        targets
    }

    /// Sends to every matching notifier, one after another.
    pub async fn notify(
        &mut self,
        body: &str,
        title: &str,
        notify_type: NotifyType,
        filter: &TagFilter,
    ) -> DispatchReport {
        let targets = self.targets(filter, true).await;
        let mut report = DispatchReport::default();

        if targets.is_empty() {
            warn!("No notifier matched the tag filter");
            return report;
        }

        for notifier in targets {
            debug!(
                service = notifier.service_name(),
                url = %notifier.url(true),
                "Dispatching notification"
            );
            if notifier.notify(body, title, notify_type).await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Notification dispatch complete"
        );
        report
    }
}
