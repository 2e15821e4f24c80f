//! Pushjet servers.
//!
//! ```text
//! pjet://[user:pass@]host[:port]/secret_key
//! pjets://[user:pass@]host[:port]/secret_key
//! pjet://[user:pass@]host[:port]/?secret=secret_key
//! ```
//!
//! Credentials, when present, are sent as HTTP basic auth for servers that
//! sit behind an authenticating proxy.

use std::sync::Arc;

use async_trait::async_trait;
use herald_url::{ParsedUrl, quote};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::{Limits, Notify, NotifyBase, NotifyType, UrlIdentifier, encode_query};
use crate::factory::{Params, UrlArgs};
use crate::privacy::{PrivacyMode, pprint};
use crate::registry::{PluginEntry, PluginKind};
use crate::{Error, Result};

const SERVICE_NAME: &str = "Pushjet";

pub(crate) const PLUGIN: PluginEntry = PluginEntry {
    service_name: SERVICE_NAME,
    schema: "pjet",
    secure_schema: Some("pjets"),
    parse_url,
    kind: PluginKind::Notify { build },
};

pub fn parse_url(url: &ParsedUrl) -> Result<Params> {
    let mut params = Params::new();

    // ?secret= wins over the path for setups where the path is taken.
    let secret = url
        .query()
        .get("secret")
        .map(str::to_string)
        .or_else(|| url.path_segments().into_iter().next());
    if let Some(secret) = secret {
        params.set_text("secret_key", secret);
    }

    Ok(params)
}

fn build(args: UrlArgs) -> Result<Arc<dyn Notify>> {
    Ok(Arc::new(Pushjet::new(args)?))
}

#[derive(Debug)]
pub struct Pushjet {
    base: NotifyBase,
    secret_key: String,
}

impl Pushjet {
    pub fn new(args: UrlArgs) -> Result<Self> {
        let secret_key = args
            .params
            .text("secret_key")
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::rejected(SERVICE_NAME, "no secret key was specified"))?
            .to_string();

        Ok(Self {
            base: NotifyBase::from_args(SERVICE_NAME, &args, Limits::default())?,
            secret_key,
        })
    }

    fn message_url(&self) -> String {
        format!(
            "{}://{}/message/",
            self.base.http_scheme(),
            self.base.authority()
        )
    }
}

#[async_trait]
impl Notify for Pushjet {
    fn base(&self) -> &NotifyBase {
        &self.base
    }

    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn protocol(&self) -> &'static str {
        "pjet"
    }

    fn secure_protocol(&self) -> &'static str {
        "pjets"
    }

    async fn send(&self, body: &str, title: &str, _notify_type: NotifyType) -> bool {
        let url = self.message_url();
        debug!(
            url = %url,
            verify = self.base.verify_certificate,
            "Posting Pushjet notification"
        );

        let mut request = self
            .base
            .client()
            .post(&url)
            .query(&[("secret", self.secret_key.as_str())])
            .form(&[("message", body), ("title", title)]);

        if let Some(user) = &self.base.user {
            request = request.basic_auth(user, self.base.password.as_deref());
        }

        self.base.throttle().await;

        match request.send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                info!("Sent Pushjet notification");
                true
            }
            Ok(response) => {
                let status = response.status();
                let details = response.text().await.unwrap_or_default();
                warn!(status = %status, "Failed to send Pushjet notification");
                debug!(response = %details, "Pushjet response details");
                false
            }
            Err(error) => {
                warn!(
                    error = %error,
                    host = self.base.host.as_deref().unwrap_or_default(),
                    "Connection error sending Pushjet notification"
                );
                false
            }
        }
    }

    fn url(&self, privacy: bool) -> String {
        let auth = match (&self.base.user, &self.base.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                quote(user, ""),
                pprint(password, privacy, PrivacyMode::Secret, "")
            ),
            (Some(user), None) => format!("{}@", quote(user, "")),
            _ => String::new(),
        };

        format!(
            "{}://{}{}/{}/?{}",
            self.schema(),
            auth,
            self.base.authority(),
            pprint(&self.secret_key, privacy, PrivacyMode::Secret, ""),
            encode_query(&self.base.url_parameters())
        )
    }

    fn url_identifier(&self) -> UrlIdentifier {
        UrlIdentifier {
            schema: self.schema().to_string(),
            parts: vec![
                self.base.user.clone(),
                self.base.password.clone(),
                self.base.host.clone(),
                self.base.port.map(|port| port.to_string()),
                Some(self.secret_key.clone()),
            ],
        }
    }
}
