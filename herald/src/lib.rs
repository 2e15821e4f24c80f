//! herald: URL-driven notification dispatch.
//!
//! Notification targets are described by URLs (`mmost://host/token`,
//! `pjet://host/secret`, `json://host/path`). URLs can be added directly or
//! loaded from config sources (local files, HTTP endpoints, in-memory
//! strings) that may import each other. Notifiers and sources carry tags,
//! and a tag filter picks which of them a message goes to.

pub mod aggregator;
pub mod asset;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod logging;
pub mod notify;
pub mod privacy;
pub mod registry;
pub mod settings;
pub mod tag;
pub mod utils;

pub use aggregator::{AddOptions, ConfigInput, ConfigSet};
pub use asset::Asset;
pub use config::{CachePolicy, ConfigFormat, ConfigSource, IncludeMode, SourceState};
pub use dispatch::{DispatchReport, Herald};
pub use error::{Error, Result};
pub use factory::{Instance, InstantiateOptions, instantiate, try_instantiate};
pub use notify::{Notify, NotifyType, UrlIdentifier};
pub use registry::SchemeRegistry;
pub use settings::Settings;
pub use tag::{MATCH_ALL_TAG, MATCH_ALWAYS_TAG, TagFilter, TagTerm, Tags, tags};
