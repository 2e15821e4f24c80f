//! Remote config over HTTP(S).
//!
//! ```text
//! http://[user[:pass]@]host[:port]/path/config.yml[?format=yaml&+X-Header=v]
//! https://...
//! ```
//!
//! Every remaining query argument is forwarded to the server. `+` prefixed
//! arguments become request headers.

use std::time::Duration;

use async_trait::async_trait;
use herald_url::{ParsedUrl, parse_bool, quote, schema_of};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use super::{ConfigContent, ConfigFormat, ConfigOrigin, IncludeMode};
use crate::factory::{Params, UrlArgs};
use crate::privacy::{PrivacyMode, pprint};
use crate::registry::{PluginEntry, PluginKind};
use crate::utils::http_client::{ClientSettings, build_client};
use crate::{Error, Result};

const SERVICE_NAME: &str = "HTTP";

/// Largest response body accepted, in bytes.
pub const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Query keys consumed locally instead of being forwarded.
const LOCAL_KEYS: &[&str] = &["format", "verify"];

pub(crate) const PLUGIN: PluginEntry = PluginEntry {
    service_name: SERVICE_NAME,
    schema: "http",
    secure_schema: Some("https"),
    parse_url,
    kind: PluginKind::Config {
        build,
        include_mode: IncludeMode::Always,
    },
};

pub fn parse_url(url: &ParsedUrl) -> Result<Params> {
    let mut params = Params::new();
    let query = url.query();
    if let Some(format) = query.get("format") {
        params.set_text("format", format);
    }
    params.set_flag(
        "verify",
        query.get("verify").map_or(true, |v| parse_bool(v, true)),
    );
    Ok(params)
}

fn build(args: &UrlArgs) -> Result<Box<dyn ConfigOrigin>> {
    Ok(Box::new(HttpOrigin::new(args)?))
}

#[derive(Debug)]
pub struct HttpOrigin {
    secure: bool,
    endpoint: Url,
    user: Option<String>,
    password: Option<String>,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(args: &UrlArgs) -> Result<Self> {
        let url = &args.url;
        let host = url
            .host()
            .ok_or_else(|| Error::rejected(SERVICE_NAME, "no host was specified"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let scheme = if args.secure { "https" } else { "http" };
        let path = quote(url.fullpath(), "/");

        let mut endpoint = Url::parse(&format!("{scheme}://{authority}{path}"))
            .map_err(|e| Error::rejected(SERVICE_NAME, e.to_string()))?;
        {
            let forwarded: Vec<(&str, &str)> = url
                .query()
                .iter()
                .filter(|(key, _)| !key.starts_with('+') && !LOCAL_KEYS.contains(key))
                .filter_map(|(key, values)| Some((key, values.last()?.as_str())))
                .collect();
            if !forwarded.is_empty() {
                endpoint.query_pairs_mut().extend_pairs(forwarded);
            }
        }

        let verify_certificate = args.params.flag("verify").unwrap_or(true);
        let client = build_client(&ClientSettings {
            user_agent: args.asset.app_id.clone(),
            verify_certificate,
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: REQUEST_TIMEOUT,
        })
        .map_err(|e| {
            Error::rejected(SERVICE_NAME, format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            secure: args.secure,
            endpoint,
            user: url.user().map(str::to_string),
            password: url.password().map(str::to_string),
            headers: url
                .query()
                .prefixed('+')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn format_from_content_type(content_type: &str) -> Option<ConfigFormat> {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("yaml") {
        Some(ConfigFormat::Yaml)
    } else if content_type.starts_with("text/plain") || content_type.starts_with("text/html") {
        Some(ConfigFormat::Text)
    } else {
        None
    }
}

#[async_trait]
impl ConfigOrigin for HttpOrigin {
    fn schema(&self) -> &str {
        if self.secure { "https" } else { "http" }
    }

    async fn read(&self) -> Result<ConfigContent> {
        let origin = self.url(true);
        debug!(url = %origin, "Fetching remote configuration");

        let mut request = self.client.post(self.endpoint.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::fetch_failed(&origin, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_failed(origin, format!("HTTP {status}")));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_SIZE as u64)
        {
            return Err(Error::fetch_failed(origin, "response exceeds size limit"));
        }

        let format = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(format_from_content_type);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch_failed(&origin, e))?;
        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(Error::fetch_failed(origin, "response exceeds size limit"));
        }

        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::fetch_failed(&origin, "response is not UTF-8"))?;

        Ok(ConfigContent::new(text).with_format(format))
    }

    fn url(&self, privacy: bool) -> String {
        let auth = match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                quote(user, ""),
                pprint(password, privacy, PrivacyMode::Secret, "")
            ),
            (Some(user), None) => format!("{}@", quote(user, "")),
            _ => String::new(),
        };
        let host = self.endpoint.host_str().unwrap_or_default();
        let port = self
            .endpoint
            .port()
            .map(|port| format!(":{port}"))
            .unwrap_or_default();
        let query = self
            .endpoint
            .query()
            .map(|query| format!("?{query}"))
            .unwrap_or_default();

        format!(
            "{}://{auth}{host}{port}{}{query}",
            self.schema(),
            self.endpoint.path()
        )
    }

    /// Relative references are joined onto this endpoint.
    fn resolve(&self, reference: &str) -> String {
        if schema_of(reference).is_some() {
            return reference.to_string();
        }
        match self.endpoint.join(reference) {
            Ok(joined) => joined.to_string(),
            Err(_) => reference.to_string(),
        }
    }
}
