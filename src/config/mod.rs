//! Site configuration management for `kestrel.toml`.
//!
//! # Sections
//!
//! | Section          | Purpose                                          |
//! |------------------|--------------------------------------------------|
//! | `[base]`         | Site metadata (title, url, language)             |
//! | `[build]`        | Source/output directories, minify, RSS, sitemap  |
//! | `[contents]`     | Ids of the home and not-found documents          |
//! | `[transformers]` | External command pipelines per content type      |
//! | `[extra]`        | User-defined fields, merged into every context   |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Site"
//! url = "https://example.com"
//!
//! [build]
//! content = "content"
//! output = "public"
//!
//! [build.rss]
//! enable = true
//!
//! [extra]
//! analytics_id = "UA-12345"
//! ```

mod base;
mod build;
mod contents;
pub mod defaults;
mod error;

pub use base::BaseConfig;
pub use build::{BuildConfig, RssConfig, SitemapConfig};
pub use contents::{ContentsConfig, PipelineConfig, TransformersConfig};
pub use error::ConfigError;

use crate::{
    cli::Cli,
    content::{Map, Value, merge},
    map,
};
use chrono::{Datelike, Utc};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing kestrel.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub base: BaseConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub contents: ContentsConfig,

    #[serde(default)]
    pub transformers: TransformersConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Directory holding override content types.
    pub fn override_types_dir(&self) -> PathBuf {
        self.build.overrides.join("types")
    }

    /// Apply CLI flags and resolve every directory against the root.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        if let Some(args) = cli.build_args() {
            self.build.clean |= args.clean;
            Self::update_option(&mut self.build.minify, args.minify.as_ref());
            Self::update_option(&mut self.build.rss.enable, args.rss.as_ref());
            Self::update_option(&mut self.build.sitemap.enable, args.sitemap.as_ref());
            if let Some(url) = &args.base_url {
                self.base.url = Some(url.clone());
            }
        }

        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.update_path_with_root(&root);
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every directory against `root` as absolute paths.
    pub fn update_path_with_root(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        let build = &mut self.build;
        for dir in [
            &mut build.content,
            &mut build.types,
            &mut build.overrides,
            &mut build.templates,
            &mut build.assets,
            &mut build.output,
        ] {
            *dir = Self::normalize_path(&root.join(&*dir));
        }
    }

    /// Absolute path, canonicalized when it exists.
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base_url) = &self.base.url
            && !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
        {
            return Err(ConfigError::BaseUrlScheme(base_url.clone()));
        }

        if self.build.rss.enable && self.base.url.is_none() {
            return Err(ConfigError::MissingBaseUrl);
        }

        if !self.build.content.is_dir() {
            return Err(ConfigError::MissingContentDir(self.build.content.clone()));
        }

        for (type_id, pipeline) in &self.transformers.pipelines {
            let empty = |argv: &Vec<String>| argv.first().is_none_or(|program| program.trim().is_empty());
            if pipeline.run.iter().any(empty) {
                return Err(ConfigError::EmptyCommand(type_id.clone()));
            }
        }

        Ok(())
    }

    /// Context shared by every rendered page.
    ///
    /// `[extra]` keys sit at the top level; the site metadata lives under
    /// `site` and wins over an `[extra]` key of the same name.
    pub fn global_context(&self) -> Map {
        let mut context: Map = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_toml(value)))
            .collect();

        merge(
            &mut context,
            map! {
                "baseUrl" => self.base.base_url(),
                "year" => i64::from(Utc::now().year()),
                "site" => map! {
                    "title" => self.base.title.as_str(),
                    "description" => self.base.description.as_str(),
                    "author" => self.base.author.as_str(),
                    "url" => self.base.base_url(),
                    "language" => self.base.language.as_str(),
                },
            },
        );
        context
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str("[base]\ntitle = \"My Site\"\n").unwrap();
        assert_eq!(config.base.title, "My Site");
    }

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(SiteConfig::from_str("[base\ntitle = \"x\"\n").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kestrel.toml");
        fs::write(&path, "[base\n").unwrap();
        let result = SiteConfig::from_path(&path);
        assert!(matches!(result, Err(ConfigError::Toml { path: p, .. }) if p == path));
    }

    #[test]
    fn test_from_path_missing() {
        let result = SiteConfig::from_path(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str("[unknown_section]\nfield = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_get_root_default() {
        assert_eq!(SiteConfig::default().get_root(), Path::new("./"));
    }

    #[test]
    fn test_update_with_cli() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "kestrel",
            "--root",
            dir.path().to_str().unwrap(),
            "build",
            "--clean",
            "--minify",
            "false",
            "--sitemap",
            "--base-url",
            "https://override.example",
        ]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.get_root(), root);
        assert_eq!(config.build.content, root.join("content"));
        assert_eq!(config.override_types_dir(), root.join("overrides").join("types"));
        assert!(config.build.clean);
        assert!(!config.build.minify);
        assert!(config.build.sitemap.enable);
        assert_eq!(config.base.url.as_deref(), Some("https://override.example"));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();

        let mut config = SiteConfig::default();
        config.update_path_with_root(dir.path());
        assert!(config.validate().is_ok());

        config.build.rss.enable = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingBaseUrl)));

        config.base.url = Some("ftp://example.com".into());
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrlScheme(_))));

        config.base.url = Some("https://example.com".into());
        assert!(config.validate().is_ok());

        config.transformers.pipelines.insert(
            "post".into(),
            PipelineConfig {
                run: vec![vec!["cat".into()], vec![]],
                is_markdown_result: true,
            },
        );
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCommand(id)) if id == "post"));
        config.transformers.pipelines.clear();

        fs::remove_dir(dir.path().join("content")).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingContentDir(_))));
    }

    #[test]
    fn test_global_context() {
        let config = SiteConfig::from_str(
            r#"
            [base]
            title = "Kestrel"
            url = "https://example.com/"

            [extra]
            analytics = "UA-1"
            site = "shadowed"
            [extra.social]
            github = "kestrel"
        "#,
        )
        .unwrap();

        let context = config.global_context();
        assert_eq!(context["analytics"], Value::from("UA-1"));
        assert_eq!(context["baseUrl"], Value::from("https://example.com"));
        assert_eq!(context["social"].as_map().unwrap()["github"], Value::from("kestrel"));

        let site = context["site"].as_map().unwrap();
        assert_eq!(site["title"], Value::from("Kestrel"));
        assert_eq!(site["language"], Value::from("en-US"));
    }
}
