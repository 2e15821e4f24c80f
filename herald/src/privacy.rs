//! Masking of secrets in URLs.
//!
//! Notifiers render their own URL with [`pprint`] when asked for a private
//! form; [`redact_url`] is applied to raw user input before it is logged.

use herald_url::{ParsedUrl, quote, schema_of};

/// How a private value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyMode {
    /// Replaced entirely.
    Secret,
    /// First and last character kept: `a...z`.
    Outer,
    /// Last four characters kept: `...wxyz`.
    Tail,
}

const SECRET_MASK: &str = "****";

/// Renders `value` for a URL, masked when `privacy` is set and
/// percent-encoded (with `safe` characters left alone) otherwise.
pub fn pprint(value: &str, privacy: bool, mode: PrivacyMode, safe: &str) -> String {
    if !privacy {
        return quote(value, safe);
    }
    if value.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = value.chars().collect();
    match mode {
        PrivacyMode::Secret => SECRET_MASK.to_string(),
        PrivacyMode::Outer if chars.len() > 2 => {
            format!("{}...{}", chars[0], chars[chars.len() - 1])
        }
        PrivacyMode::Tail if chars.len() > 4 => {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("...{tail}")
        }
        _ => SECRET_MASK.to_string(),
    }
}

/// Masks credentials and path segments of an arbitrary URL for logging.
///
/// Unparseable input is masked wholesale, keeping only its scheme.
pub fn redact_url(raw: &str) -> String {
    let Ok(url) = ParsedUrl::parse(raw) else {
        return match schema_of(raw) {
            Some(schema) => format!("{schema}://{SECRET_MASK}"),
            None => SECRET_MASK.to_string(),
        };
    };

    let mut out = format!("{}://", url.schema());
    if let Some(user) = url.user() {
        out.push_str(&quote(user, ""));
        if url.password().is_some() {
            out.push(':');
            out.push_str(SECRET_MASK);
        }
        out.push('@');
    }
    if let Some(host) = url.host() {
        out.push_str(host);
    }
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }

    let segments = url.path_segments();
    if url.host().is_none() {
        // Local paths are not secret.
        out.push_str(&quote(url.fullpath(), "/"));
    } else {
        for segment in &segments {
            out.push('/');
            out.push_str(&pprint(segment, true, PrivacyMode::Outer, ""));
        }
    }
    out
}
