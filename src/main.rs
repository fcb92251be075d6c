//! Kestrel - a schema-driven static site generator.

mod build;
mod cli;
mod config;
mod content;
mod context;
mod generator;
mod loader;
mod logger;
mod render;
mod schema;
mod utils;

use anyhow::{Result, bail};
use build::{build_site, check_site};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => {
            let summary = build_site(&config)?;
            if summary.failed > 0 {
                bail!("{} of {} pages failed to render", summary.failed, summary.failed + summary.written);
            }
            Ok(())
        }
        Commands::Check => check_site(&config).map(|_| ()),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("config file `{}` not found", config_path.display());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}
