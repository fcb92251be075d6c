//! `[contents]` and `[transformers]` sections.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `[contents]` section - documents with a fixed output location.
///
/// ```toml
/// [contents]
/// home = "home"        # rendered to index.html
/// not_found = "404"    # rendered to 404.html
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ContentsConfig {
    /// Document id rendered to `index.html`.
    #[serde(default = "defaults::contents::home")]
    #[educe(Default = defaults::contents::home())]
    pub home: String,

    /// Document id rendered to `404.html`.
    #[serde(default = "defaults::contents::not_found")]
    #[educe(Default = defaults::contents::not_found())]
    pub not_found: String,
}

/// `[transformers]` section - external commands run over raw content.
///
/// ```toml
/// [transformers.pipelines.post]
/// run = [["scripts/shortcodes"], ["pandoc", "-f", "markdown", "-t", "html"]]
/// is_markdown_result = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformersConfig {
    /// Pipeline per content type id.
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

/// One pipeline: commands chained through stdin/stdout.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Commands as argv arrays: program first, then its arguments.
    #[serde(default)]
    pub run: Vec<Vec<String>>,

    /// Whether the output is still markdown (rendered afterwards) or HTML.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub is_markdown_result: bool,
}
