//! Branding passed down to notifiers.

use serde::{Deserialize, Serialize};

use crate::notify::NotifyType;

/// Application identity used by notifiers for User-Agent headers and
/// default bot names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    pub app_id: String,
    pub app_desc: String,
    pub app_url: String,
    /// Icon URL template; `{TYPE}` is replaced with the notification type.
    /// Empty disables icons.
    pub image_url_mask: String,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            app_id: "Herald".to_string(),
            app_desc: "Herald Notifications".to_string(),
            app_url: String::new(),
            image_url_mask: String::new(),
        }
    }
}

impl Asset {
    /// Applies the string entries of a config document's `asset:` block.
    /// Unknown keys and non-string values are ignored.
    pub fn apply_overrides<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in entries {
            match key {
                "app_id" => self.app_id = value.to_string(),
                "app_desc" => self.app_desc = value.to_string(),
                "app_url" => self.app_url = value.to_string(),
                "image_url_mask" => self.image_url_mask = value.to_string(),
                _ => tracing::debug!(key, "Ignoring unknown asset key"),
            }
        }
    }

    /// Icon URL for `notify_type`, if an image mask is configured.
    pub fn image_url(&self, notify_type: NotifyType) -> Option<String> {
        if self.image_url_mask.is_empty() {
            return None;
        }
        Some(self.image_url_mask.replace("{TYPE}", notify_type.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_known_keys_only() {
        let mut asset = Asset::default();
        asset.apply_overrides([("app_id", "Ops"), ("colour", "red")]);
        assert_eq!(asset.app_id, "Ops");
        assert_eq!(asset.app_desc, "Herald Notifications");
    }

    #[test]
    fn image_url_uses_mask() {
        let mut asset = Asset::default();
        assert_eq!(asset.image_url(NotifyType::Info), None);
        asset.image_url_mask = "https://img.example/{TYPE}.png".to_string();
        assert_eq!(
            asset.image_url(NotifyType::Warning).as_deref(),
            Some("https://img.example/warning.png")
        );
    }
}
