//! Local config files.
//!
//! ```text
//! file:///etc/herald/herald.yml
//! /etc/herald/herald.cfg          (no scheme means file)
//! file://relative/path.cfg?format=yaml
//! ```
//!
//! Query arguments such as `format` need the `file://` prefix. A bare path
//! is quoted whole, so a `?` stays part of the file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use herald_url::{FILE_SCHEMA, ParsedUrl, quote, schema_of};

use super::{ConfigContent, ConfigFormat, ConfigOrigin, IncludeMode};
use crate::factory::{Params, UrlArgs};
use crate::registry::{PluginEntry, PluginKind};
use crate::{Error, Result};

const SERVICE_NAME: &str = "Local File";

/// Largest file read, in bytes.
pub const MAX_FILE_SIZE: u64 = 128 * 1024;

pub(crate) const PLUGIN: PluginEntry = PluginEntry {
    service_name: SERVICE_NAME,
    schema: FILE_SCHEMA,
    secure_schema: None,
    parse_url,
    kind: PluginKind::Config {
        build,
        include_mode: IncludeMode::Strict,
    },
};

pub fn parse_url(url: &ParsedUrl) -> Result<Params> {
    let mut params = Params::new();
    params.set_text("path", url.fullpath());
    if let Some(format) = url.query().get("format") {
        params.set_text("format", format);
    }
    Ok(params)
}

fn build(args: &UrlArgs) -> Result<Box<dyn ConfigOrigin>> {
    Ok(Box::new(FileOrigin::new(args.params.text("path").unwrap_or_default())?))
}

#[derive(Debug, Clone)]
pub struct FileOrigin {
    path: PathBuf,
}

impl FileOrigin {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::rejected(SERVICE_NAME, "no path was specified"));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format_hint(&self) -> Option<ConfigFormat> {
        match self.path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }
}

#[async_trait]
impl ConfigOrigin for FileOrigin {
    fn schema(&self) -> &str {
        FILE_SCHEMA
    }

    async fn read(&self) -> Result<ConfigContent> {
        let origin = self.path.display().to_string();

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| Error::fetch_failed(&origin, e))?;
        if !metadata.is_file() {
            return Err(Error::fetch_failed(origin, "not a regular file"));
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::fetch_failed(
                origin,
                format!("file is {} bytes, limit is {MAX_FILE_SIZE}", metadata.len()),
            ));
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::fetch_failed(&origin, e))?;

        Ok(ConfigContent::new(text).with_format(self.format_hint()))
    }

    fn url(&self, _privacy: bool) -> String {
        format!(
            "{FILE_SCHEMA}://{}",
            quote(&self.path.to_string_lossy(), "/\\:")
        )
    }

    /// Relative references are taken from this file's directory.
    fn resolve(&self, reference: &str) -> String {
        if schema_of(reference).is_some() || Path::new(reference).is_absolute() {
            return reference.to_string();
        }
        match self.path.parent() {
            Some(dir) => dir.join(reference).to_string_lossy().into_owned(),
            None => reference.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_file_and_infers_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "urls:\n  - json://localhost").unwrap();

        let origin = FileOrigin::new(file.path()).unwrap();
        let content = origin.read().await.unwrap();
        assert_eq!(content.format, Some(ConfigFormat::Yaml));
        assert!(content.text.contains("json://localhost"));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'#'; MAX_FILE_SIZE as usize + 1]).unwrap();

        let origin = FileOrigin::new(file.path()).unwrap();
        assert!(matches!(
            origin.read().await,
            Err(Error::FetchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let origin = FileOrigin::new(dir.path().join("absent.cfg")).unwrap();
        assert!(origin.read().await.is_err());

        let origin = FileOrigin::new(dir.path()).unwrap();
        assert!(origin.read().await.is_err());
    }

    #[test]
    fn resolves_relative_references() {
        let origin = FileOrigin::new("/etc/herald/main.cfg").unwrap();
        assert_eq!(origin.resolve("more.cfg"), "/etc/herald/more.cfg");
        assert_eq!(origin.resolve("/opt/other.cfg"), "/opt/other.cfg");
        assert_eq!(
            origin.resolve("https://example.com/x.yml"),
            "https://example.com/x.yml"
        );
    }

    #[test]
    fn parses_paths() {
        let url = ParsedUrl::parse("file:///etc/herald/a%20b.cfg?format=yaml").unwrap();
        let params = parse_url(&url).unwrap();
        assert_eq!(params.text("path"), Some("/etc/herald/a b.cfg"));
        assert_eq!(params.text("format"), Some("yaml"));

        let origin = FileOrigin::new(params.text("path").unwrap()).unwrap();
        assert_eq!(origin.url(false), "file:///etc/herald/a%20b.cfg");
    }

    #[test]
    fn format_argument_needs_a_scheme() {
        let url = ParsedUrl::parse("file://relative/path.cfg?format=yaml").unwrap();
        let params = parse_url(&url).unwrap();
        assert_eq!(params.text("path"), Some("relative/path.cfg"));
        assert_eq!(params.text("format"), Some("yaml"));

        let url = ParsedUrl::parse("relative/path.cfg?format=yaml").unwrap();
        let params = parse_url(&url).unwrap();
        assert_eq!(params.text("path"), Some("relative/path.cfg?format=yaml"));
        assert_eq!(params.text("format"), None);
    }
}
