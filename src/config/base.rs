//! `[base]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in kestrel.toml - site metadata.
///
/// Published to templates as `site.title`, `site.url`, ...
///
/// # Example
/// ```toml
/// [base]
/// title = "My Site"
/// description = "Notes and essays"
/// url = "https://example.com"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Author name for the RSS feed.
    #[serde(default = "defaults::base::author")]
    #[educe(Default = defaults::base::author())]
    pub author: String,

    /// Base URL for permalinks, RSS and the sitemap.
    /// Without it permalinks are root-relative.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: Option<String>,

    /// BCP 47 language code.
    #[serde(default = "defaults::base::language")]
    #[educe(Default = defaults::base::language())]
    pub language: String,
}

impl BaseConfig {
    /// Base URL without a trailing slash, `""` when unset.
    pub fn base_url(&self) -> &str {
        self.url.as_deref().unwrap_or_default().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_base_config_full() {
        let config: SiteConfig = toml::from_str(
            r#"
            [base]
            title = "Kestrel"
            description = "A site"
            author = "Ada"
            url = "https://example.com/"
            language = "fr-FR"
        "#,
        )
        .unwrap();

        assert_eq!(config.base.title, "Kestrel");
        assert_eq!(config.base.author, "Ada");
        assert_eq!(config.base.language, "fr-FR");
        assert_eq!(config.base.base_url(), "https://example.com");
    }

    #[test]
    fn test_base_config_defaults() {
        let config: SiteConfig = toml::from_str("[base]\ntitle = \"Test\"\n").unwrap();

        assert_eq!(config.base.description, "");
        assert_eq!(config.base.language, "en-US");
        assert_eq!(config.base.url, None);
        assert_eq!(config.base.base_url(), "");
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result: Result<SiteConfig, _> =
            toml::from_str("[base]\ntitle = \"Test\"\nunknown_field = 1\n");
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }
}
