//! Configuration errors.
//!
//! Every variant names the file or the `[section.key]` to fix.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid config file `{path}`")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("[base.url] `{0}` must start with http:// or https://")]
    BaseUrlScheme(String),

    #[error("[base.url] is required when [build.rss] is enabled")]
    MissingBaseUrl,

    #[error("[build.content] directory `{0}` not found")]
    MissingContentDir(PathBuf),

    #[error("[transformers.pipelines.{0}] contains an empty command")]
    EmptyCommand(String),
}
