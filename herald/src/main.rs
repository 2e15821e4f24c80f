use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use herald::{AddOptions, ConfigSet, Herald, NotifyType, Settings, Tags, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("reading HERALD_* settings")?;
    logging::init_logging(settings.log_filter.as_deref())?;

    let mut herald = Herald::new().with_asset(settings.asset.clone());
    let mut loaded = true;

    if !settings.urls.is_empty() {
        loaded &= herald.add(&settings.urls, &Tags::new());
    }

    if !settings.config.is_empty() {
        let mut configs = ConfigSet::new()
            .with_asset(settings.asset.clone())
            .with_cache(settings.cache)
            .with_recursion(settings.recursion)
            .with_insecure_includes(settings.insecure_includes);
        loaded &= configs.add(
            settings.config.iter().map(String::as_str),
            &AddOptions::default(),
        );
        herald.add_config(configs);
    }

    if herald.is_empty() {
        error!("Nothing to notify: set HERALD_URLS or HERALD_CONFIG");
        return Ok(ExitCode::from(2));
    }

    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("reading message body from stdin")?;

    let report = herald
        .notify(
            body.trim_end(),
            &settings.title,
            NotifyType::Info,
            &settings.tag_filter(),
        )
        .await;

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "herald finished"
    );

    if report.is_success() && loaded {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
