//! Config document formats.
//!
//! Text documents hold one directive per line:
//!
//! ```text
//! # comment, ; also starts one
//! mmost://host/token
//! ops,devops=pjet://host/secret
//! json://host/hook#ops,urgent
//! include /etc/herald/more.yml
//! ```
//!
//! YAML documents are a mapping:
//!
//! ```yaml
//! version: 1
//! asset:
//!   app_id: Ops
//! tag: team
//! urls:
//!   - mmost://host/token
//!   - pjet://host/secret:
//!       - tag: ops
//!       - tag: urgent
//!         verify: no
//! include:
//!   - https://config.example.com/shared.yml
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use super::ConfigFormat;
use crate::tag::{Tags, tags};
use crate::{Error, Result};

/// One notification URL taken from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntry {
    pub url: String,
    pub tags: Tags,
    /// Query values applied over the URL's own.
    pub overrides: Vec<(String, String)>,
}

/// An import of another config origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub url: String,
    pub tags: Tags,
}

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    pub entries: Vec<ConfigEntry>,
    pub includes: Vec<IncludeDirective>,
    /// `asset:` block entries, structured documents only.
    pub asset: Vec<(String, String)>,
}

static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([#;].*)?$").expect("static comment regex"));

static TEXT_DETECT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(([a-z0-9, \t_-]+)?=\s*)?([a-z][a-z0-9+-]*://|(include|import)\s)")
        .expect("static text detection regex")
});

static YAML_DETECT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*[a-z0-9_-]+:(\s|$)").expect("static yaml detection regex")
});

static TEXT_INCLUDE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(?P<tags>[a-z0-9, \t_-]+)?=\s*)?(?:include|import)\s+(?P<target>\S.*?)\s*$")
        .expect("static include regex")
});

static TEXT_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(?P<tags>[a-z0-9, \t_-]+)?=\s*)?(?P<url>[a-z][a-z0-9+-]*://\S*)\s*$")
        .expect("static url regex")
});

static TAG_ANNOTATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9, _-]+$").expect("static tag annotation regex"));

/// Guesses the format from the first significant line.
///
/// Documents without any significant line count as text; content that
/// looks like neither format yields `None`.
pub fn detect_format(content: &str) -> Option<ConfigFormat> {
    let Some(line) = content.lines().find(|line| !COMMENT_REGEX.is_match(line)) else {
        return Some(ConfigFormat::Text);
    };

    if TEXT_DETECT_REGEX.is_match(line) {
        Some(ConfigFormat::Text)
    } else if YAML_DETECT_REGEX.is_match(line) || line.trim_start() == "---" {
        Some(ConfigFormat::Yaml)
    } else {
        None
    }
}

/// Parses a text document. Any unrecognized line rejects the document.
pub fn parse_text(content: &str) -> Result<ParsedConfig> {
    let mut parsed = ParsedConfig::default();

    for (number, line) in content.lines().enumerate() {
        if COMMENT_REGEX.is_match(line) {
            continue;
        }

        if let Some(caps) = TEXT_INCLUDE_REGEX.captures(line) {
            parsed.includes.push(IncludeDirective {
                url: caps["target"].to_string(),
                tags: caps.name("tags").map(|m| tags([m.as_str()])).unwrap_or_default(),
            });
            continue;
        }

        let Some(caps) = TEXT_URL_REGEX.captures(line) else {
            return Err(Error::malformed(format!(
                "invalid line {} in text configuration",
                number + 1
            )));
        };

        let mut entry_tags: Tags = caps.name("tags").map(|m| tags([m.as_str()])).unwrap_or_default();
        let (url, annotation) = split_tag_annotation(&caps["url"]);
        entry_tags.extend(annotation);

        parsed.entries.push(ConfigEntry {
            url: url.to_string(),
            tags: entry_tags,
            overrides: Vec::new(),
        });
    }

    Ok(parsed)
}

/// Splits a trailing `#tag1,tag2` off a URL.
fn split_tag_annotation(url: &str) -> (&str, Tags) {
    match url.rsplit_once('#') {
        Some((base, fragment))
            if !base.is_empty() && !fragment.is_empty() && TAG_ANNOTATION_REGEX.is_match(fragment) =>
        {
            (base, tags([fragment]))
        }
        _ => (url, Tags::new()),
    }
}

/// Parses a YAML document.
///
/// A bad `version` or a non-mapping document rejects everything; malformed
/// individual `urls` entries are skipped with a warning.
pub fn parse_yaml(content: &str) -> Result<ParsedConfig> {
    let document: Value = serde_yaml::from_str(content)?;
    let root = match document {
        Value::Mapping(root) => root,
        Value::Null => return Ok(ParsedConfig::default()),
        _ => return Err(Error::malformed("YAML configuration is not a mapping")),
    };

    if let Some(version) = root.get("version") {
        let supported = match version {
            Value::Number(n) => n.as_u64() == Some(1),
            Value::String(s) => s.trim() == "1",
            _ => false,
        };
        if !supported {
            return Err(Error::malformed(format!(
                "unsupported YAML configuration version: {}",
                scalar_to_string(version).unwrap_or_default()
            )));
        }
    }

    let mut parsed = ParsedConfig::default();

    if let Some(asset) = root.get("asset") {
        match asset {
            Value::Mapping(asset) => {
                parsed.asset = asset
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar_to_string(v)?)))
                    .collect();
            }
            _ => warn!("Ignoring asset block that is not a mapping"),
        }
    }

    let global_tags = root.get("tag").map(tags_of).unwrap_or_default();

    for key in ["include", "import"] {
        if let Some(includes) = root.get(key) {
            for target in string_list(includes) {
                parsed.includes.push(IncludeDirective {
                    url: target,
                    tags: Tags::new(),
                });
            }
        }
    }

    match root.get("urls") {
        Some(Value::Sequence(items)) => {
            for (index, item) in items.iter().enumerate() {
                parse_url_item(index, item, &global_tags, &mut parsed.entries);
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => warn!("Ignoring urls block that is not a list"),
    }

    Ok(parsed)
}

fn parse_url_item(index: usize, item: &Value, global_tags: &Tags, entries: &mut Vec<ConfigEntry>) {
    match item {
        Value::String(url) => entries.push(ConfigEntry {
            url: url.trim().to_string(),
            tags: global_tags.clone(),
            overrides: Vec::new(),
        }),
        Value::Mapping(mapping) if mapping.len() == 1 => {
            let Some((Value::String(url), overrides)) = mapping.iter().next() else {
                warn!(index, "Ignoring urls entry without a string key");
                return;
            };
            let url = url.trim();
            match overrides {
                Value::Null => entries.push(ConfigEntry {
                    url: url.to_string(),
                    tags: global_tags.clone(),
                    overrides: Vec::new(),
                }),
                Value::Mapping(overrides) => {
                    entries.push(entry_with_overrides(url, overrides, global_tags));
                }
                Value::Sequence(list) => {
                    for overrides in list {
                        match overrides {
                            Value::Mapping(overrides) => {
                                entries.push(entry_with_overrides(url, overrides, global_tags));
                            }
                            _ => warn!(index, "Ignoring urls override that is not a mapping"),
                        }
                    }
                }
                _ => warn!(index, "Ignoring urls entry with unsupported overrides"),
            }
        }
        _ => warn!(index, "Ignoring invalid urls entry"),
    }
}

fn entry_with_overrides(url: &str, overrides: &Mapping, global_tags: &Tags) -> ConfigEntry {
    let mut entry = ConfigEntry {
        url: url.to_string(),
        tags: global_tags.clone(),
        overrides: Vec::new(),
    };

    for (key, value) in overrides {
        let Some(key) = key.as_str() else {
            continue;
        };
        if key == "tag" {
            entry.tags.extend(tags_of(value));
            continue;
        }
        match scalar_to_string(value) {
            Some(value) => entry.overrides.push((key.to_string(), value)),
            None => debug!(key, "Ignoring override without a scalar value"),
        }
    }

    entry
}

fn tags_of(value: &Value) -> Tags {
    tags(string_list(value))
}

/// A string, or a list of scalars, as strings.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}
