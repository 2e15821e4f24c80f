use std::{sync::OnceLock, time::Duration};

use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed a provider already.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Transport settings a notifier or remote config origin asks for.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub verify_certificate: bool,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

/// Build a `reqwest::Client` for one notifier or config origin.
///
/// Builder failures are returned to the caller, which reports them as a
/// rejected construction.
pub fn build_client(settings: &ClientSettings) -> reqwest::Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.as_str());

    if settings.request_timeout > Duration::ZERO {
        builder = builder.timeout(settings.request_timeout);
    }

    if settings.connect_timeout > Duration::ZERO {
        builder = builder.connect_timeout(settings.connect_timeout);
    }

    if !settings.verify_certificate {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build()
}
