//! Notification backends.
//!
//! Every backend implements [`Notify`] on top of a shared [`NotifyBase`]
//! that carries the attributes common to all of them (transport security,
//! credentials, tags, throttling and message limits).

pub mod json;
pub mod mattermost;
pub mod pushjet;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use herald_url::{parse_bool, quote};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::asset::Asset;
use crate::factory::UrlArgs;
use crate::tag::Tags;
use crate::utils::http_client::{ClientSettings, build_client};
use crate::{Error, Result};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyType {
    #[default]
    Info,
    Success,
    Warning,
    Failure,
}

impl NotifyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for NotifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "failure" => Ok(Self::Failure),
            other => Err(Error::malformed(format!("unknown notification type: {other}"))),
        }
    }
}

/// What happens to a body longer than the backend accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowMode {
    /// Sent as-is; the upstream service decides.
    #[default]
    Upstream,
    /// Cut at the backend's body limit.
    Truncate,
    /// Sent as several messages.
    Split,
}

impl OverflowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Truncate => "truncate",
            Self::Split => "split",
        }
    }
}

impl FromStr for OverflowMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" => Ok(Self::Upstream),
            "truncate" => Ok(Self::Truncate),
            "split" => Ok(Self::Split),
            other => Err(Error::malformed(format!("unknown overflow mode: {other}"))),
        }
    }
}

/// Per-backend message limits and request pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum body length in characters; 0 means unlimited.
    pub body_maxlen: usize,
    /// Maximum title length in characters; 0 means the backend has no title
    /// and it is folded into the body.
    pub title_maxlen: usize,
    /// Minimum spacing between two requests.
    pub request_rate: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            body_maxlen: 32_768,
            title_maxlen: 250,
            request_rate: Duration::ZERO,
        }
    }
}

/// The fields that make a notifier unique, for caller-side de-duplication.
/// Targets (channels, recipients) are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlIdentifier {
    pub schema: String,
    pub parts: Vec<Option<String>>,
}

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(4);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// State shared by every backend.
#[derive(Debug)]
pub struct NotifyBase {
    pub secure: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tags: Tags,
    pub asset: Asset,
    pub verify_certificate: bool,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub overflow: OverflowMode,
    pub limits: Limits,
    client: reqwest::Client,
    last_io: Mutex<Option<Instant>>,
}

impl NotifyBase {
    /// Builds the shared state from `args`, reading the common query
    /// arguments (`verify`, `rto`, `cto`, `overflow`).
    pub fn from_args(service: &'static str, args: &UrlArgs, limits: Limits) -> Result<Self> {
        let query = args.url.query();

        let verify_certificate = query.get("verify").map_or(true, |v| parse_bool(v, true));
        let request_timeout = parse_seconds(service, "rto", query.get("rto"))?
            .unwrap_or(DEFAULT_READ_TIMEOUT);
        let connect_timeout = parse_seconds(service, "cto", query.get("cto"))?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let overflow = match query.get("overflow") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::rejected(service, format!("invalid overflow mode: {value}")))?,
            None => OverflowMode::default(),
        };

        let client = build_client(&ClientSettings {
            user_agent: args.asset.app_id.clone(),
            verify_certificate,
            request_timeout,
            connect_timeout,
        })
        .map_err(|e| {
            Error::rejected(service, format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            secure: args.secure,
            host: args.url.host().map(str::to_string),
            port: args.url.port(),
            user: args.url.user().map(str::to_string),
            password: args.url.password().map(str::to_string),
            tags: args.tags.clone(),
            asset: args.asset.clone(),
            verify_certificate,
            request_timeout,
            connect_timeout,
            overflow,
            limits,
            client,
            last_io: Mutex::new(None),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `http` or `https`, following the secure flag.
    pub fn http_scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// `host[:port]` for building request URLs.
    pub fn authority(&self) -> String {
        let host = self.host.as_deref().unwrap_or_default();
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Waits until the backend's request rate allows another request.
    ///
    /// The first call never waits; it only records the time.
    pub async fn throttle(&self) {
        let rate = self.limits.request_rate;
        if rate.is_zero() {
            return;
        }

        let wait = {
            let mut last_io = self.last_io.lock();
            let now = Instant::now();
            let wait = last_io
                .map(|previous| (previous + rate).saturating_duration_since(now))
                .unwrap_or_default();
            *last_io = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Throttling notification");
            tokio::time::sleep(wait).await;
        }
    }

    /// Applies title folding and the overflow mode, returning the
    /// `(title, body)` pairs to send.
    pub fn prepare(&self, body: &str, title: &str) -> Vec<(String, String)> {
        let Limits {
            body_maxlen,
            title_maxlen,
            ..
        } = self.limits;

        let (title, body) = if title_maxlen == 0 {
            if title.is_empty() {
                (String::new(), body.to_string())
            } else {
                (String::new(), format!("{title}\r\n{body}"))
            }
        } else {
            (truncate_chars(title, title_maxlen), body.to_string())
        };

        if body_maxlen == 0 || body.chars().count() <= body_maxlen {
            return vec![(title, body)];
        }

        match self.overflow {
            OverflowMode::Upstream => vec![(title, body)],
            OverflowMode::Truncate => vec![(title, truncate_chars(&body, body_maxlen))],
            OverflowMode::Split => {
                let chars: Vec<char> = body.chars().collect();
                chars
                    .chunks(body_maxlen)
                    .map(|chunk| (title.clone(), chunk.iter().collect()))
                    .collect()
            }
        }
    }

    /// Common query arguments for rebuilding the URL.
    pub fn url_parameters(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("overflow".to_string(), self.overflow.as_str().to_string()),
            (
                "verify".to_string(),
                if self.verify_certificate { "yes" } else { "no" }.to_string(),
            ),
        ];
        if self.request_timeout != DEFAULT_READ_TIMEOUT {
            params.push(("rto".to_string(), format_seconds(self.request_timeout)));
        }
        if self.connect_timeout != DEFAULT_CONNECT_TIMEOUT {
            params.push(("cto".to_string(), format_seconds(self.connect_timeout)));
        }
        params
    }
}

/// Percent-encodes `params` into a query string (without the `?`).
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", quote(key, "+-:"), quote(value, "")))
        .collect::<Vec<_>>()
        .join("&")
}

fn parse_seconds(service: &'static str, key: &str, value: Option<&str>) -> Result<Option<Duration>> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(Some)
        .ok_or_else(|| Error::rejected(service, format!("invalid {key} timeout: {value}")))
}

fn format_seconds(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{secs:.0}")
    } else {
        secs.to_string()
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// A notification backend.
#[async_trait]
pub trait Notify: Send + Sync + fmt::Debug {
    fn base(&self) -> &NotifyBase;

    fn service_name(&self) -> &'static str;

    fn protocol(&self) -> &'static str;

    fn secure_protocol(&self) -> &'static str;

    /// Delivers one already-prepared message. Failures are logged by the
    /// backend and reported as `false`.
    async fn send(&self, body: &str, title: &str, notify_type: NotifyType) -> bool;

    /// The URL that rebuilds this notifier; secrets masked when `privacy`.
    fn url(&self, privacy: bool) -> String;

    fn url_identifier(&self) -> UrlIdentifier;

    fn tags(&self) -> &Tags {
        &self.base().tags
    }

    /// The scheme this notifier would be registered under.
    fn schema(&self) -> &'static str {
        if self.base().secure {
            self.secure_protocol()
        } else {
            self.protocol()
        }
    }

    /// Applies the overflow mode and sends every resulting message.
    async fn notify(&self, body: &str, title: &str, notify_type: NotifyType) -> bool {
        let mut ok = true;
        for (title, body) in self.base().prepare(body, title) {
            if !self.send(&body, &title, notify_type).await {
                ok = false;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Params;
    use crate::tag::tags;
    use herald_url::ParsedUrl;
    use rstest::rstest;

    fn base_for(url: &str, limits: Limits) -> Result<NotifyBase> {
        let args = UrlArgs {
            url: ParsedUrl::parse(url).unwrap(),
            secure: false,
            params: Params::new(),
            tags: tags(["ops"]),
            asset: Asset::default(),
            cache: Default::default(),
            recursion: 0,
            insecure_includes: false,
        };
        NotifyBase::from_args("Test", &args, limits)
    }

    #[test]
    fn reads_common_arguments() {
        let base = base_for(
            "json://u:p@host:8080/?verify=no&rto=2.5&cto=1&overflow=split",
            Limits::default(),
        )
        .unwrap();
        assert!(!base.verify_certificate);
        assert_eq!(base.request_timeout, Duration::from_millis(2500));
        assert_eq!(base.connect_timeout, Duration::from_secs(1));
        assert_eq!(base.overflow, OverflowMode::Split);
        assert_eq!(base.authority(), "host:8080");
        assert_eq!(base.user.as_deref(), Some("u"));
        assert!(base.tags.contains("ops"));

        let params = base.url_parameters();
        assert!(params.contains(&("rto".to_string(), "2.5".to_string())));
        assert!(params.contains(&("cto".to_string(), "1".to_string())));
        assert!(params.contains(&("verify".to_string(), "no".to_string())));
    }

    #[test]
    fn rejects_bad_common_arguments() {
        assert!(matches!(
            base_for("json://host/?overflow=explode", Limits::default()),
            Err(Error::ConstructorRejected { .. })
        ));
        assert!(base_for("json://host/?rto=-1", Limits::default()).is_err());
    }

    #[rstest]
    #[case("json://host/?rto=1e300")]
    #[case("json://host/?cto=1e300")]
    #[case("json://host/?rto=inf")]
    #[case("json://host/?cto=NaN")]
    fn rejects_unrepresentable_timeouts(#[case] url: &str) {
        assert!(matches!(
            base_for(url, Limits::default()),
            Err(Error::ConstructorRejected { .. })
        ));
    }

    #[test]
    fn title_is_folded_when_unsupported() {
        let limits = Limits {
            title_maxlen: 0,
            ..Limits::default()
        };
        let base = base_for("json://host", limits).unwrap();
        assert_eq!(
            base.prepare("body", "Title"),
            vec![(String::new(), "Title\r\nbody".to_string())]
        );
        assert_eq!(
            base.prepare("body", ""),
            vec![(String::new(), "body".to_string())]
        );
    }

    #[test]
    fn overflow_modes() {
        let limits = Limits {
            body_maxlen: 4,
            title_maxlen: 3,
            ..Limits::default()
        };

        let upstream = base_for("json://host", limits).unwrap();
        assert_eq!(
            upstream.prepare("abcdefghij", "Title"),
            vec![("Tit".to_string(), "abcdefghij".to_string())]
        );

        let truncate = base_for("json://host/?overflow=truncate", limits).unwrap();
        assert_eq!(
            truncate.prepare("abcdefghij", ""),
            vec![(String::new(), "abcd".to_string())]
        );

        let split = base_for("json://host/?overflow=split", limits).unwrap();
        let bodies: Vec<String> = split
            .prepare("abcdefghij", "")
            .into_iter()
            .map(|(_, body)| body)
            .collect();
        assert_eq!(bodies, ["abcd", "efgh", "ij"]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_requests() {
        let limits = Limits {
            request_rate: Duration::from_secs(1),
            ..Limits::default()
        };
        let base = base_for("json://host", limits).unwrap();

        let start = Instant::now();
        base.throttle().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        base.throttle().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_never_waits() {
        let base = base_for("json://host", Limits::default()).unwrap();
        let start = Instant::now();
        base.throttle().await;
        base.throttle().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn notify_type_round_trips_through_str() {
        for kind in [
            NotifyType::Info,
            NotifyType::Success,
            NotifyType::Warning,
            NotifyType::Failure,
        ] {
            assert_eq!(kind.as_str().parse::<NotifyType>().unwrap(), kind);
        }
        assert!("loud".parse::<NotifyType>().is_err());
    }
}
