//! Percent-encoding and list/bool helpers shared by every URL consumer.

use crate::UrlError;

/// Percent-encodes `input`, leaving unreserved characters and any character
/// listed in `safe` untouched.
pub fn quote(input: &str, safe: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for c in input.chars() {
        if safe.contains(c) {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Decodes percent-escapes. Fails when the decoded bytes are not UTF-8.
pub fn unquote(input: &str) -> Result<String, UrlError> {
    urlencoding::decode(input)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| UrlError::InvalidEncoding(input.to_string()))
}

/// Splits a raw (still encoded) path into decoded, non-empty segments.
pub fn split_path(raw_path: &str) -> Result<Vec<String>, UrlError> {
    raw_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(unquote)
        .collect()
}

/// Splits comma, semicolon and whitespace separated values.
///
/// Empty entries are dropped and duplicates removed; first occurrence wins
/// the position.
pub fn parse_list<I, S>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for input in inputs {
        for item in input
            .as_ref()
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        {
            if !item.is_empty() && !out.iter().any(|existing| existing == item) {
                out.push(item.to_string());
            }
        }
    }
    out
}

/// Interprets common yes/no spellings; anything else yields `default`.
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" | "on" | "enable" | "enabled" | "allow" | "+" => true,
        "0" | "n" | "no" | "false" | "off" | "disable" | "disabled" | "deny" | "never" | "-" => {
            false
        }
        _ => default,
    }
}
