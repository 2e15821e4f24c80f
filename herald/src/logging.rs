//! Subscriber setup for binaries embedding the library.
//!
//! The library itself only emits `tracing` events; nothing is printed until
//! [`init_logging`] (or another subscriber) is installed.

use chrono::Local;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "herald=info";

/// Timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Builds the filter: `RUST_LOG` wins, then `directive`, then
/// [`DEFAULT_LOG_FILTER`].
pub fn build_filter(directive: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_directive(directive.unwrap_or(DEFAULT_LOG_FILTER))
}

fn parse_directive(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Other(format!("Invalid filter directive: {e}")))
}

/// Installs a global subscriber writing to stderr.
pub fn init_logging(directive: Option<&str>) -> Result<()> {
    tracing_subscriber::registry()
        .with(build_filter(directive)?)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))
}
