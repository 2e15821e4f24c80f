//! Mattermost incoming webhooks.
//!
//! ```text
//! mmost://[botname@]host[:port][/path]/token[?channel=a,b&image=yes]
//! mmosts://[botname@]host[:port][/path]/token
//! ```
//!
//! The last path segment is the webhook token; anything before it is a
//! path prefix for installations served below the web root.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_url::{ParsedUrl, parse_bool, parse_list, quote};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Limits, Notify, NotifyBase, NotifyType, UrlIdentifier, encode_query};
use crate::factory::{Params, UrlArgs};
use crate::privacy::{PrivacyMode, pprint};
use crate::registry::{PluginEntry, PluginKind};
use crate::{Error, Result};

const SERVICE_NAME: &str = "Mattermost";

pub(crate) const PLUGIN: PluginEntry = PluginEntry {
    service_name: SERVICE_NAME,
    schema: "mmost",
    secure_schema: Some("mmosts"),
    parse_url,
    kind: PluginKind::Notify { build },
};

const LIMITS: Limits = Limits {
    body_maxlen: 4000,
    title_maxlen: 0,
    request_rate: Duration::from_millis(250),
};

/// Extracts the token, path prefix, channels and image flag.
pub fn parse_url(url: &ParsedUrl) -> Result<Params> {
    let mut params = Params::new();
    let mut segments = url.path_segments();

    if let Some(token) = segments.pop() {
        params.set_text("token", token);
    }
    if !segments.is_empty() {
        params.set_text("fullpath", format!("/{}", segments.join("/")));
    }

    let query = url.query();
    let channels = parse_list(
        ["to", "channel", "channels"]
            .iter()
            .flat_map(|key| query.get_all(key).iter()),
    );
    params.set_list("channels", channels);

    if let Some(image) = query.get("image") {
        params.set_flag("image", parse_bool(image, false));
    }
    if let Some(botname) = query.get("botname") {
        params.set_text("botname", botname);
    }

    Ok(params)
}

fn build(args: UrlArgs) -> Result<Arc<dyn Notify>> {
    Ok(Arc::new(Mattermost::new(args)?))
}

/// Posts to a Mattermost incoming webhook, once per channel.
#[derive(Debug)]
pub struct Mattermost {
    base: NotifyBase,
    token: String,
    fullpath: String,
    channels: Vec<String>,
    include_image: bool,
}

impl Mattermost {
    pub fn new(args: UrlArgs) -> Result<Self> {
        let token = args
            .params
            .text("token")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::rejected(SERVICE_NAME, "no webhook token was specified"))?
            .to_string();

        let mut base = NotifyBase::from_args(SERVICE_NAME, &args, LIMITS)?;
        if let Some(botname) = args.params.text("botname") {
            base.user = Some(botname.to_string());
        }

        Ok(Self {
            token,
            fullpath: args
                .params
                .text("fullpath")
                .map(|path| path.trim().to_string())
                .unwrap_or_default(),
            channels: args
                .params
                .list("channels")
                .iter()
                .map(|channel| channel.trim_start_matches('#').to_string())
                .filter(|channel| !channel.is_empty())
                .collect(),
            include_image: args.params.flag("image").unwrap_or(false),
            base,
        })
    }

    fn webhook_url(&self) -> String {
        format!(
            "{}://{}{}/hooks/{}",
            self.base.http_scheme(),
            self.base.authority(),
            self.fullpath.trim_end_matches('/'),
            self.token
        )
    }
}

#[async_trait]
impl Notify for Mattermost {
    fn base(&self) -> &NotifyBase {
        &self.base
    }

    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn protocol(&self) -> &'static str {
        "mmost"
    }

    fn secure_protocol(&self) -> &'static str {
        "mmosts"
    }

    async fn send(&self, body: &str, _title: &str, notify_type: NotifyType) -> bool {
        let icon_url = if self.include_image {
            self.base.asset.image_url(notify_type)
        } else {
            None
        };
        let username = self
            .base
            .user
            .clone()
            .unwrap_or_else(|| self.base.asset.app_id.clone());

        let targets: Vec<Option<&str>> = if self.channels.is_empty() {
            vec![None]
        } else {
            self.channels.iter().map(|c| Some(c.as_str())).collect()
        };

        let url = self.webhook_url();
        let mut has_error = false;

        for channel in targets {
            let mut payload = json!({
                "text": body,
                "icon_url": icon_url,
                "username": username,
            });
            if let Some(channel) = channel {
                payload["channel"] = json!(channel);
            }

            debug!(
                verify = self.base.verify_certificate,
                channel = channel.unwrap_or_default(),
                "Posting Mattermost notification"
            );

            self.base.throttle().await;

            match self.base.client().post(&url).json(&payload).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!(channel = channel.unwrap_or_default(), "Sent Mattermost notification");
                }
                Ok(response) => {
                    let status = response.status();
                    let details = response.text().await.unwrap_or_default();
                    warn!(
                        status = %status,
                        channel = channel.unwrap_or_default(),
                        "Failed to send Mattermost notification"
                    );
                    debug!(response = %details, "Mattermost response details");
                    has_error = true;
                }
                Err(error) => {
                    warn!(
                        error = %error,
                        channel = channel.unwrap_or_default(),
                        "Connection error sending Mattermost notification"
                    );
                    has_error = true;
                }
            }
        }

        !has_error
    }

    fn url(&self, privacy: bool) -> String {
        let mut params = vec![(
            "image".to_string(),
            if self.include_image { "yes" } else { "no" }.to_string(),
        )];
        params.extend(self.base.url_parameters());
        if !self.channels.is_empty() {
            params.push(("channel".to_string(), self.channels.join(",")));
        }

        let botname = self
            .base
            .user
            .as_deref()
            .map(|user| format!("{}@", quote(user, "")))
            .unwrap_or_default();

        let fullpath = if self.fullpath.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", quote(self.fullpath.trim_end_matches('/'), "/"))
        };

        format!(
            "{}://{}{}{}{}/?{}",
            self.schema(),
            botname,
            self.base.authority(),
            fullpath,
            pprint(&self.token, privacy, PrivacyMode::Outer, ""),
            encode_query(&params)
        )
    }

    fn url_identifier(&self) -> UrlIdentifier {
        UrlIdentifier {
            schema: self.schema().to_string(),
            parts: vec![
                Some(self.token.clone()),
                self.base.host.clone(),
                self.base.port.map(|port| port.to_string()),
                Some(self.fullpath.clone()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{Instance, InstantiateOptions, try_instantiate};
    use crate::registry::SchemeRegistry;

    fn instantiate(url: &str) -> Result<Arc<dyn Notify>> {
        match try_instantiate(&SchemeRegistry::global(), url, &InstantiateOptions::default())? {
            Instance::Notify(notifier) => Ok(notifier),
            Instance::Config(_) => panic!("expected a notifier"),
        }
    }

    #[test]
    fn parses_path_prefix_and_token() {
        let url = ParsedUrl::parse("mmost://host/sub/dir/TOKEN?to=a&channel=b,%23c").unwrap();
        let params = parse_url(&url).unwrap();
        assert_eq!(params.text("token"), Some("TOKEN"));
        assert_eq!(params.text("fullpath"), Some("/sub/dir"));
        assert_eq!(params.list("channels"), ["a", "b", "#c"]);
    }

    #[test]
    fn builds_webhook_url() {
        let notifier = Mattermost::new(UrlArgs {
            url: ParsedUrl::parse("mmosts://chat.example.com:8443/team/TOKEN").unwrap(),
            secure: true,
            params: parse_url(&ParsedUrl::parse("mmosts://chat.example.com:8443/team/TOKEN").unwrap())
                .unwrap(),
            tags: Default::default(),
            asset: Default::default(),
            cache: Default::default(),
            recursion: 0,
            insecure_includes: false,
        })
        .unwrap();
        assert_eq!(
            notifier.webhook_url(),
            "https://chat.example.com:8443/team/hooks/TOKEN"
        );
    }

    #[test]
    fn missing_token_is_rejected() {
        assert!(matches!(
            instantiate("mmost://localhost"),
            Err(Error::ConstructorRejected { service: "Mattermost", .. })
        ));
    }

    #[test]
    fn channels_drop_hash_prefix() {
        let notifier = instantiate("mmost://bot@localhost/TOKEN?channel=%23ops,dev").unwrap();
        let url = notifier.url(false);
        assert!(url.starts_with("mmost://bot@localhost/TOKEN/?"), "{url}");
        assert!(url.contains("channel=ops%2Cdev"), "{url}");
    }

    #[test]
    fn url_round_trips() {
        for raw in [
            "mmost://localhost/TOKEN",
            "mmosts://bot@chat.example.com:8065/a/b/TOKEN?channel=ops&image=yes",
            "mmost://localhost:80/TOKEN?botname=herald&overflow=truncate",
        ] {
            let first = instantiate(raw).unwrap();
            let second = instantiate(&first.url(false)).unwrap();
            assert_eq!(first.url_identifier(), second.url_identifier(), "{raw}");
            assert_eq!(first.url(false), second.url(false));
        }
    }

    #[test]
    fn private_url_masks_token() {
        let notifier = instantiate("mmost://localhost/ABCDEFGH").unwrap();
        let url = notifier.url(true);
        assert!(url.contains("/A...H/"), "{url}");
        assert!(!url.contains("ABCDEFGH"));
    }

    #[test]
    fn identifier_uses_secure_schema() {
        let notifier = instantiate("mmosts://localhost/TOKEN").unwrap();
        assert_eq!(notifier.url_identifier().schema, "mmosts");
        assert_eq!(notifier.service_name(), "Mattermost");
    }
}
