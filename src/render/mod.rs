//! Rendering driver.
//!
//! Turns the resolved corpus into [`RenderJob`]s: one per paginated list page
//! and one per document. Nothing here touches the filesystem; the build step
//! renders jobs through a [`template::TemplateRenderer`] and writes them.
//!
//! # Context shape
//!
//! ```text
//! document page                      list page
//! ├── <global>  (extra, baseUrl)     ├── <global>
//! ├── site                           ├── site
//! │   ├── title, url, ...            │   └── context
//! │   └── context.<type>.<query>     ├── pagination
//! ├── page      (full context)       │   ├── links, items
//! └── template                       │   └── current, total
//!                                    ├── page  (slug, permalink, number)
//!                                    └── template
//! ```
//!
//! `<global>` and `site` are built once and shared by every job through an
//! [`Arc`]; [`RenderJob::render_context`] merges them in when the job is
//! rendered.

pub mod markdown;
pub mod pagination;
pub mod template;
pub mod transform;

use crate::{
    config::ContentsConfig,
    content::{Document, Map, Value, merged},
    context::{RELATION_DEPTH, Resolver, SiteContext, permalink},
    map,
    schema::{ContentType, Pagination, Query},
};
use pagination::{chunk, links, pagination_context};
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// One output file: the template to render, its context and where it goes.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub template: String,
    /// Global context and site lists, one allocation for the whole build.
    pub shared: Arc<Map>,
    /// Page-specific layers: `page`, `pagination`, `template`.
    pub context: Map,
    /// Relative to the output directory.
    pub destination: PathBuf,
    pub content_type: String,
    pub slug: String,
}

impl RenderJob {
    /// Complete template context: the shared layers, then this page's.
    pub fn render_context(&self) -> Map {
        merged(self.shared.as_ref().clone(), self.context.clone())
    }
}

/// Output files claimed by more than one job. Fatal, like duplicate slugs.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("several pages write the same file: {}", .0.join("; "))]
pub struct DestinationCollisions(pub Vec<String>);

/// Report every destination written by more than one job, with its owners.
pub fn check_destinations(jobs: &[RenderJob]) -> Result<(), DestinationCollisions> {
    let mut claims: BTreeMap<&Path, Vec<&RenderJob>> = BTreeMap::new();
    for job in jobs {
        claims.entry(job.destination.as_path()).or_default().push(job);
    }

    let collisions: Vec<String> = claims
        .into_iter()
        .filter(|(_, owners)| owners.len() > 1)
        .map(|(path, owners)| {
            let owners: Vec<String> = owners
                .iter()
                .map(|job| format!("{} `{}`", job.content_type, job.slug))
                .collect();
            format!("`{}` ({})", path.display(), owners.join(", "))
        })
        .collect();

    if collisions.is_empty() {
        Ok(())
    } else {
        Err(DestinationCollisions(collisions))
    }
}

pub struct BuildInput<'a> {
    pub resolver: &'a Resolver<'a>,
    pub site: &'a SiteContext,
    /// Config-derived context shared by every page.
    pub global: &'a Map,
    pub contents: &'a ContentsConfig,
}

/// Every page of the site, lists first.
pub fn build(input: &BuildInput<'_>) -> Vec<RenderJob> {
    let shared = shared_context(input);

    let paginated: Vec<(&ContentType, &Pagination)> = input
        .resolver
        .registry()
        .iter()
        .filter_map(|content_type| Some((content_type, content_type.pagination.as_ref()?)))
        .collect();

    let mut jobs: Vec<RenderJob> = paginated
        .par_iter()
        .flat_map_iter(|(content_type, pagination)| {
            list_jobs(input, &shared, content_type, pagination)
        })
        .collect();

    let documents: Vec<&Document> = input.resolver.store().iter().collect();
    jobs.par_extend(
        documents
            .par_iter()
            .map(|doc| document_job(input, &shared, doc)),
    );
    jobs
}

/// Global context with the expanded site lists under `site.context`.
fn shared_context(input: &BuildInput<'_>) -> Arc<Map> {
    let lists = input.site.expand(input.resolver).clone();
    Arc::new(merged(
        input.global.clone(),
        map! { "site" => map! { "context" => lists } },
    ))
}

fn document_job(input: &BuildInput<'_>, shared: &Arc<Map>, doc: &Document) -> RenderJob {
    let template = document_template(input, doc);
    let context = map! {
        "page" => input.resolver.full_context(doc),
        "template" => template.as_str(),
    };

    RenderJob {
        destination: document_destination(input.contents, doc),
        template,
        shared: Arc::clone(shared),
        context,
        content_type: doc.content_type.clone(),
        slug: doc.slug.clone(),
    }
}

/// Front-matter `template`, else the type's template, else the default.
pub fn document_template(input: &BuildInput<'_>, doc: &Document) -> String {
    if let Some(template) = doc.front_matter().get("template").and_then(Value::as_str) {
        return template.to_owned();
    }
    input
        .resolver
        .registry()
        .get(&doc.content_type)
        .map(ContentType::template_or_default)
        .unwrap_or(crate::schema::DEFAULT_TEMPLATE)
        .to_owned()
}

/// Front-matter `output`, else the home and not-found files, else
/// `<slug>/index.html`.
pub fn document_destination(contents: &ContentsConfig, doc: &Document) -> PathBuf {
    if let Some(output) = doc.front_matter().get("output").and_then(Value::as_str) {
        return PathBuf::from(output.trim_start_matches('/'));
    }
    if doc.id == contents.home {
        return PathBuf::from("index.html");
    }
    if doc.id == contents.not_found {
        return PathBuf::from("404.html");
    }
    index_path(&doc.slug)
}

fn index_path(slug: &str) -> PathBuf {
    let slug = slug.trim_matches('/');
    if slug.is_empty() {
        PathBuf::from("index.html")
    } else {
        Path::new(slug).join("index.html")
    }
}

/// One job per page, plus the first page again at the pagination root.
///
/// The root is `pagination.root`, else the type's `location`. A type with
/// neither gets only the numbered pages.
fn list_jobs(
    input: &BuildInput<'_>,
    shared: &Arc<Map>,
    content_type: &ContentType,
    pagination: &Pagination,
) -> Vec<RenderJob> {
    let resolver = input.resolver;
    let unlimited = Query {
        limit: None,
        ..pagination.query.clone()
    };
    let documents = unlimited.apply(resolver.store().of_type(&content_type.id));
    let pages = chunk(&documents, pagination.query.limit);
    let total = pages.len();

    let template = pagination
        .template
        .as_deref()
        .unwrap_or_else(|| content_type.template_or_default())
        .to_owned();

    let root = pagination
        .root
        .as_deref()
        .or(content_type.location.as_deref())
        .map(|root| root.trim_matches('/'));

    let mut jobs = Vec::with_capacity(total + 1);
    for (index, page) in pages.into_iter().enumerate() {
        let number = index + 1;
        let links = links(total, &pagination.slug, resolver.base_url(), number);
        let slug = links[index].slug.clone();

        let context = map! {
            "pagination" => pagination_context(&links, resolver.expand(page, RELATION_DEPTH - 1), number),
            "page" => map! {
                "slug" => slug.as_str(),
                "permalink" => permalink(resolver.base_url(), &slug),
                "contentType" => content_type.id.as_str(),
                "number" => number,
            },
            "template" => template.as_str(),
        };

        if number == 1
            && let Some(root) = root
        {
            jobs.push(RenderJob {
                template: template.clone(),
                shared: Arc::clone(shared),
                context: context.clone(),
                destination: index_path(root),
                content_type: content_type.id.clone(),
                slug: root.to_owned(),
            });
        }

        jobs.push(RenderJob {
            template: template.clone(),
            shared: Arc::clone(shared),
            context,
            destination: index_path(&slug),
            content_type: content_type.id.clone(),
            slug,
        });
    }
    jobs
}
