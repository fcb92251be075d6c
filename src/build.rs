//! Site building orchestration.
//!
//! # Pipeline
//!
//! ```text
//! build_site()
//!     │
//!     ├── load_site()      types → Registry, documents → DocumentStore
//!     │
//!     ├── plan()           Resolver + SiteContext → render::build() → RenderJob[]
//!     │                    (two jobs writing one file abort the build)
//!     │
//!     ├── render_jobs()    templates, in parallel; failures skip one page
//!     │
//!     └── copy_assets(), rss, sitemap
//! ```
//!
//! Schema and identity errors abort before anything is written. A page that
//! fails to render is logged with its content type and slug and the rest of
//! the site is still written.

use crate::{
    config::SiteConfig,
    content::DocumentStore,
    context::{ContextCache, Resolver, SiteContext, report_unresolved_references},
    generator::{rss::build_rss, sitemap::build_sitemap},
    loader,
    log,
    logger::Progress,
    render::{
        self, BuildInput, RenderJob,
        markdown::CommonMark,
        template::{TemplateRenderer, Templates},
        transform::Pipelines,
    },
    schema::Registry,
    utils::minify::{OutputKind, minify},
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub written: usize,
    pub failed: usize,
}

// ============================================================================
// Public API
// ============================================================================

/// Build the whole site into `config.build.output`.
pub fn build_site(config: &SiteConfig) -> Result<BuildSummary> {
    let (registry, store) = load_site(config)?;
    let jobs = plan(config, &registry, &store)?;

    let output = &config.build.output;
    prepare_output(output, config.build.clean)?;

    let templates = Templates::new(&config.build.templates, &config.build.date_format);
    let rendered = render_jobs(&templates, &jobs, output, config.build.minify);
    let failed = jobs.len() - rendered.len();

    let assets = copy_assets(&config.build.assets, output)?;
    if assets > 0 {
        log!("assets"; "{assets} files copied");
    }

    if config.build.rss.enable {
        let xml = build_rss(config, &registry, &rendered)?;
        let path = write_output(output, &config.build.rss.path, xml.as_bytes(), config.build.minify)?;
        log!("rss"; "{}", path.display());
    }

    if config.build.sitemap.enable {
        let xml = build_sitemap(config.base.base_url(), &rendered)?;
        let path = write_output(output, &config.build.sitemap.path, xml.as_bytes(), config.build.minify)?;
        log!("sitemap"; "{}", path.display());
    }

    let summary = BuildSummary {
        written: rendered.len(),
        failed,
    };
    if failed > 0 {
        log!("warn"; "{} pages written, {failed} failed", summary.written);
    } else {
        log!("build"; "{} pages written", summary.written);
    }
    Ok(summary)
}

/// Load and resolve everything without writing. Returns the page count.
pub fn check_site(config: &SiteConfig) -> Result<usize> {
    let (registry, store) = load_site(config)?;
    let jobs = plan(config, &registry, &store)?;
    log!("check"; "{} content types, {} documents, {} pages", registry.len(), store.len(), jobs.len());
    Ok(jobs.len())
}

// ============================================================================
// Phases
// ============================================================================

fn load_site(config: &SiteConfig) -> Result<(Registry, DocumentStore)> {
    let registry = loader::load_registry(config).context("failed to load content types")?;
    let raw = loader::load_documents(config, &registry).context("failed to load documents")?;
    let store = DocumentStore::new(&registry, raw)?;
    if store.is_empty() {
        log!("warn"; "no documents found in `{}`", config.build.content.display());
    } else {
        log!("content"; "{} documents, {} content types", store.len(), registry.len());
    }

    report_unresolved_references(&registry, &store);
    Ok((registry, store))
}

fn plan(config: &SiteConfig, registry: &Registry, store: &DocumentStore) -> Result<Vec<RenderJob>> {
    let cache = ContextCache::new();
    let pipelines = Pipelines::new(&config.transformers, config.get_root());

    let mut resolver = Resolver::new(registry, store, &cache, &CommonMark, config.base.base_url());
    if !pipelines.is_empty() {
        resolver = resolver.with_transformer(&pipelines);
    }

    let site = SiteContext::collect(registry, store);
    let global = config.global_context();
    let jobs = render::build(&BuildInput {
        resolver: &resolver,
        site: &site,
        global: &global,
        contents: &config.contents,
    });
    render::check_destinations(&jobs)?;
    log!("content"; "{} documents rendered, {} pages planned", cache.len(), jobs.len());
    Ok(jobs)
}

/// Render and write every job. Returns the jobs that made it to disk.
fn render_jobs<'a>(
    templates: &impl TemplateRenderer,
    jobs: &'a [RenderJob],
    output: &Path,
    minify: bool,
) -> Vec<&'a RenderJob> {
    let progress = Progress::start("render", jobs.len());
    let rendered: Vec<&RenderJob> = jobs
        .par_iter()
        .filter(|job| {
            let result = templates
                .render(&job.template, &job.render_context())
                .map_err(anyhow::Error::from)
                .and_then(|html| write_output(output, &job.destination, &html, minify));

            if let Some(progress) = &progress {
                progress.inc();
            }
            match result {
                Ok(_) => true,
                Err(err) => {
                    log!("error"; "{} `{}`: {err:#}", job.content_type, job.slug);
                    false
                }
            }
        })
        .collect();

    drop(progress);
    rendered
}

// ============================================================================
// Output
// ============================================================================

/// Create the output directory, emptying it first when `clean` is set.
fn prepare_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("failed to clear output directory `{}`", output.display()))?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory `{}`", output.display()))
}

/// Write `content` to `output/relative`, minified by extension when enabled.
pub fn write_output(output: &Path, relative: &Path, content: &[u8], minify_enabled: bool) -> Result<PathBuf> {
    let path = output.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = minify(OutputKind::from_path(&path), content, minify_enabled);
    fs::write(&path, &*content).with_context(|| format!("failed to write `{}`", path.display()))?;
    Ok(path)
}

/// Copy the assets directory verbatim. A missing directory copies nothing.
fn copy_assets(assets: &Path, output: &Path) -> Result<usize> {
    let files: Vec<PathBuf> = walk_all(assets);
    files.par_iter().try_for_each(|path| -> Result<()> {
        let relative = path.strip_prefix(assets)?;
        let dest = output.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &dest).with_context(|| format!("failed to copy asset `{}`", relative.display()))?;
        Ok(())
    })?;
    Ok(files.len())
}

fn walk_all(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}
