//! `[build]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in kestrel.toml - source and output layout.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"      # documents (markdown + front matter)
/// types = "types"          # content type definitions (YAML)
/// overrides = "overrides"  # overrides/types/*.yml replace base types
/// templates = "templates"
/// output = "public"
/// minify = true
///
/// [build.rss]
/// enable = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    #[serde(default = "defaults::build::types")]
    #[educe(Default = defaults::build::types())]
    pub types: PathBuf,

    /// Override directory; content types are read from its `types/` child.
    #[serde(default = "defaults::build::overrides")]
    #[educe(Default = defaults::build::overrides())]
    pub overrides: PathBuf,

    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Static files copied verbatim into the output directory.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Minify HTML and XML output.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,

    /// Default chrono format of the `date` template filter.
    #[serde(default = "defaults::build::date_format")]
    #[educe(Default = defaults::build::date_format())]
    pub date_format: String,

    #[serde(default)]
    pub rss: RssConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.rss]` section. Requires `[base].url`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct RssConfig {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = defaults::r#false())]
    pub enable: bool,

    /// Output path, relative to the output directory.
    #[serde(default = "defaults::build::rss::path")]
    #[educe(Default = defaults::build::rss::path())]
    pub path: PathBuf,
}

/// `[build.sitemap]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SitemapConfig {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = defaults::r#false())]
    pub enable: bool,

    /// Output path, relative to the output directory.
    #[serde(default = "defaults::build::sitemap::path")]
    #[educe(Default = defaults::build::sitemap::path())]
    pub path: PathBuf,
}
