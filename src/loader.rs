//! Filesystem loaders for content types and documents.
//!
//! # Layout
//!
//! ```text
//! types/post.yml              content type `post` (id defaults to file stem)
//! overrides/types/post.yml    replaces the base `post`
//! content/index.md            id `home`, slug ``
//! content/about.md            id `about`, slug `about`
//! content/posts/hello/index.md
//!                             id `hello`, slug `posts/hello`
//! ```
//!
//! Documents start with an optional YAML front matter block fenced by `---`
//! lines. Reserved front-matter keys: `id`, `slug`, `type`, `template`,
//! `output`, `publication`, `lastUpdate`.

use crate::{
    config::SiteConfig,
    content::{Map, RawDocument, Value},
    log,
    schema::{ContentType, DEFAULT_CONTENT_TYPE, Registry, SchemaError},
    utils::{date::parse_date, slug::slugify_path},
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

const FENCE: &str = "---";
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown"];
const TYPE_EXTENSIONS: &[&str] = &["yml", "yaml"];
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Id of the document at the content root.
const ROOT_ID: &str = "home";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid front matter in `{}`", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("front matter in `{}` is not a mapping", .0.display())]
    NotAMapping(PathBuf),

    #[error("unterminated front matter in `{}`", .0.display())]
    Unterminated(PathBuf),

    #[error("in `{}`", .path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
}

// ============================================================================
// Files
// ============================================================================

/// Files under `dir` with one of `extensions`, sorted. A missing `dir` is empty.
pub fn collect_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|err| LoadError::Io(path.to_path_buf(), err))
}

// ============================================================================
// Content types
// ============================================================================

/// Every content type file in `dir`, in path order.
pub fn load_content_types(dir: &Path) -> Result<Vec<ContentType>, LoadError> {
    collect_files(dir, TYPE_EXTENSIONS)
        .into_iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            ContentType::from_yaml(&read(&path)?, &stem)
                .map_err(|source| LoadError::Schema { path, source })
        })
        .collect()
}

/// Base and override types merged into a registry.
///
/// A bare `page` type is appended when no source defines one, so documents
/// outside any `location` always have a type.
pub fn load_registry(config: &SiteConfig) -> Result<Registry, LoadError> {
    let mut base = load_content_types(&config.build.types)?;
    let overrides = load_content_types(&config.override_types_dir())?;

    base.push(ContentType {
        id: DEFAULT_CONTENT_TYPE.to_owned(),
        ..ContentType::default()
    });

    Registry::load(base, overrides).map_err(|source| LoadError::Schema {
        path: config.build.types.clone(),
        source,
    })
}

// ============================================================================
// Documents
// ============================================================================

/// Split `source` into front matter and body.
///
/// The front matter is `None` when the file does not open with a fence.
/// Returns `None` when the opening fence is never closed.
pub fn split_front_matter(source: &str) -> Option<(Option<&str>, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = source
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')))
    else {
        return Some((None, source));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let body = &rest[offset + line.len()..];
            return Some((Some(&rest[..offset]), body));
        }
        offset += line.len();
    }
    None
}

/// Decode a front matter block. An empty block is an empty map.
pub fn parse_front_matter(yaml: &str, path: &Path) -> Result<Map, LoadError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|source| LoadError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;

    match Value::from_yaml(value) {
        Value::Null => Ok(Map::new()),
        Value::Map(map) => Ok(map),
        _ => Err(LoadError::NotAMapping(path.to_path_buf())),
    }
}

/// Load every document under the content directory.
pub fn load_documents(config: &SiteConfig, registry: &Registry) -> Result<Vec<RawDocument>, LoadError> {
    let root = &config.build.content;
    collect_files(root, DOCUMENT_EXTENSIONS)
        .par_iter()
        .map(|path| load_document(root, path, registry, &config.build.date_format))
        .collect()
}

fn load_document(
    root: &Path,
    path: &Path,
    registry: &Registry,
    date_format: &str,
) -> Result<RawDocument, LoadError> {
    let source = read(path)?;
    let (front_matter, body) =
        split_front_matter(&source).ok_or_else(|| LoadError::Unterminated(path.to_path_buf()))?;
    let front_matter = match front_matter {
        Some(yaml) => parse_front_matter(yaml, path)?,
        None => Map::new(),
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = relative.parent().unwrap_or(Path::new(""));
    let is_index = stem == "index";
    let page_dir = if is_index { parent.to_path_buf() } else { parent.join(&stem) };

    let text = |key: &str| front_matter.get(key).and_then(Value::to_plain_string);

    let id = text("id").unwrap_or_else(|| match (is_index, parent.file_name()) {
        (false, _) => stem.clone(),
        (true, Some(dir)) => dir.to_string_lossy().into_owned(),
        (true, None) => ROOT_ID.to_owned(),
    });

    let slug = text("slug")
        .map(|slug| slug.trim_matches('/').to_owned())
        .unwrap_or_else(|| slugify_path(&page_dir));

    let location = slugify_path(parent);
    let content_type = text("type")
        .or_else(|| registry.by_location(&location).map(|ty| ty.id.clone()))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());

    let modified = modified_time(path);
    let date = |key: &str| match front_matter.get(key) {
        Some(Value::Date(date)) => Some(*date),
        Some(Value::String(s)) => {
            let parsed = parse_date(s, Some(date_format));
            if parsed.is_none() {
                log!("warn"; "`{}`: cannot parse {key} `{s}`, using file time", relative.display());
            }
            parsed
        }
        _ => None,
    };
    let publication = date("publication").unwrap_or(modified);
    let last_modification = date("lastUpdate").unwrap_or(modified);

    Ok(RawDocument {
        id,
        slug,
        content_type,
        markdown: body.trim_start_matches(['\r', '\n']).to_owned(),
        front_matter,
        path: path.to_path_buf(),
        publication,
        last_modification,
    })
}

fn modified_time(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
