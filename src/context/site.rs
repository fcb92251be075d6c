//! Site-wide named lists declared by content types.
//!
//! Lists are collected as slugs first and expanded to contexts only when a
//! page actually asks for them.

use super::resolver::{RELATION_DEPTH, Resolver};
use crate::{
    content::{DocumentStore, Map, Value},
    schema::Registry,
};
use std::{collections::BTreeMap, sync::OnceLock};

/// `type -> query -> slugs`
type Lists = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Default)]
pub struct SiteContext {
    lists: Lists,
    expanded: OnceLock<Map>,
}

impl SiteContext {
    /// Evaluate every site query of every content type.
    pub fn collect(registry: &Registry, store: &DocumentStore) -> Self {
        let lists = registry
            .iter()
            .filter(|content_type| !content_type.site.is_empty())
            .map(|content_type| {
                let queries = content_type
                    .site
                    .iter()
                    .map(|(name, query)| {
                        let slugs = query
                            .apply(store.of_type(&content_type.id))
                            .into_iter()
                            .map(|doc| doc.slug.clone())
                            .collect();
                        (name.clone(), slugs)
                    })
                    .collect();
                (content_type.id.clone(), queries)
            })
            .collect();

        Self {
            lists,
            expanded: OnceLock::new(),
        }
    }

    /// Lists as contexts, expanded on first call and reused afterwards.
    pub fn expand(&self, resolver: &Resolver<'_>) -> &Map {
        self.expanded.get_or_init(|| {
            let store = resolver.store();
            self.lists
                .iter()
                .map(|(type_id, queries)| {
                    let queries: Map = queries
                        .iter()
                        .map(|(name, slugs)| {
                            let docs: Vec<_> = slugs.iter().filter_map(|slug| store.get(slug)).collect();
                            (name.clone(), resolver.expand(&docs, RELATION_DEPTH - 1))
                        })
                        .collect();
                    (type_id.clone(), Value::Map(queries))
                })
                .collect()
        })
    }
}
