//! Compute-once cache of rendered document content.
//!
//! Keyed by slug and valid for one build. The map lock is only held to fetch
//! or insert a cell; the computation runs inside the cell, so concurrent
//! first requests for one slug render it once and other slugs never wait.

use crate::{
    content::Map,
    map,
    render::markdown::{TocEntry, toc_value},
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

/// The content layer of a document context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentContext {
    /// Rendered HTML.
    pub contents: String,
    /// Minutes, rounded up.
    pub reading_time: usize,
    pub toc: Vec<TocEntry>,
}

impl ContentContext {
    pub fn to_map(&self) -> Map {
        map! {
            "contents" => self.contents.as_str(),
            "readingTime" => self.reading_time,
            "toc" => toc_value(&self.toc),
        }
    }
}

type Cell = Arc<OnceLock<Arc<ContentContext>>>;

#[derive(Debug, Default)]
pub struct ContextCache {
    cells: Mutex<FxHashMap<String, Cell>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached content of `slug`, computing it with `compute` on first access.
    pub fn get_or_compute(
        &self,
        slug: &str,
        compute: impl FnOnce() -> ContentContext,
    ) -> Arc<ContentContext> {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(slug.to_owned()).or_default())
        };
        Arc::clone(cell.get_or_init(|| Arc::new(compute())))
    }

    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }
}
