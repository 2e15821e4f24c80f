use std::collections::BTreeMap;

use crate::{UrlError, unquote};

/// Query-string parameters with case-insensitive keys.
///
/// A key supplied several times keeps every value. Scalar readers use
/// [`QueryParams::get`] and see the last one; list readers use
/// [`QueryParams::get_all`]. The spelling a key was last supplied with is
/// kept for [`QueryParams::prefixed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, Param>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Param {
    name: String,
    values: Vec<String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `a=1&b=2&b=3` (without the leading `?`).
    pub fn parse(query: &str) -> Result<Self, UrlError> {
        let mut params = Self::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = unquote(key)?;
            if key.trim().is_empty() {
                continue;
            }
            params.insert(key.trim(), unquote(value)?);
        }
        Ok(params)
    }

    /// Last value supplied for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .and_then(|param| param.values.last())
            .map(String::as_str)
    }

    /// Every value supplied for `key`, in order of appearance.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|param| param.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_ascii_lowercase())
    }

    /// Appends a value, keeping earlier ones for list readers.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let param = self
            .values
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| Param {
                name: String::new(),
                values: Vec::new(),
            });
        param.name = key.to_string();
        param.values.push(value.into());
    }

    /// Replaces every value of `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(
            key.to_ascii_lowercase(),
            Param {
                name: key.to_string(),
                values: vec![value.into()],
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.values
            .remove(&key.to_ascii_lowercase())
            .map(|param| param.values)
    }

    /// Keys starting with `prefix` (prefix stripped, spelling kept) paired
    /// with their last value. Used for `+Header=value` style arguments.
    pub fn prefixed(&self, prefix: char) -> impl Iterator<Item = (&str, &str)> {
        self.values.values().filter_map(move |param| {
            let name = param.name.strip_prefix(prefix)?;
            let value = param.values.last()?;
            (!name.is_empty()).then_some((name, value.as_str()))
        })
    }

    /// Lowercased keys with every value supplied for them.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(key, param)| (key.as_str(), param.values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins_for_scalars() {
        let params = QueryParams::parse("image=yes&IMAGE=no").unwrap();
        assert_eq!(params.get("image"), Some("no"));
        assert_eq!(params.get_all("Image"), ["yes", "no"]);
    }

    #[test]
    fn bare_keys_have_empty_values() {
        let params = QueryParams::parse("verbose&&=ignored&x=%20y").unwrap();
        assert_eq!(params.get("verbose"), Some(""));
        assert_eq!(params.get("x"), Some(" y"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn prefixed_keys_are_stripped() {
        let params = QueryParams::parse("+X-Token=abc&-drop=1&+=bad").unwrap();
        let headers: Vec<_> = params.prefixed('+').collect();
        assert_eq!(headers, vec![("X-Token", "abc")]);
    }

    #[test]
    fn prefixed_keys_keep_last_spelling() {
        let params = QueryParams::parse(":priority=low&:Priority=high").unwrap();
        let extras: Vec<_> = params.prefixed(':').collect();
        assert_eq!(extras, vec![("Priority", "high")]);
        assert_eq!(params.get(":PRIORITY"), Some("high"));
        assert_eq!(params.iter().next().map(|(key, _)| key), Some(":priority"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut params = QueryParams::parse("to=a&to=b").unwrap();
        params.set("TO", "c");
        assert_eq!(params.get_all("to"), ["c"]);
        assert!(params.remove("to").is_some());
        assert!(params.is_empty());
    }
}
