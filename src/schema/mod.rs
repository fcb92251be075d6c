//! Content type registry.
//!
//! Content types come from two sources: the site's own `types/` directory
//! and an override directory. An override replaces the base definition with
//! the same id; within one source the first definition of an id wins.

mod error;
mod types;

pub use error::SchemaError;
pub use types::{
    ContentType, Extracted, Filter, FilterMethod, ForeignKey, Join, LocalQuery, Order, Pagination,
    PropertySpec, PropertyType, Query, RelationSpec,
};

use crate::log;
use rustc_hash::FxHashMap;

/// Template id used when neither the document nor its type names one.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Content type assigned to documents no `location` claims.
pub const DEFAULT_CONTENT_TYPE: &str = "page";

/// Immutable set of content types, in load order.
#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<ContentType>,
    index: FxHashMap<String, usize>,
}

impl Registry {
    /// Merge override and base definitions.
    ///
    /// Overrides come first, then base types whose id is not already present.
    /// Dangling references and unknown local-query commands are reported but
    /// do not fail the load: they resolve to empty lists.
    pub fn load(base: Vec<ContentType>, overrides: Vec<ContentType>) -> Result<Self, SchemaError> {
        let mut registry = Self::default();

        for content_type in overrides.into_iter().chain(base) {
            if registry.index.contains_key(&content_type.id) {
                continue;
            }
            content_type.validate()?;
            registry
                .index
                .insert(content_type.id.clone(), registry.types.len());
            registry.types.push(content_type);
        }

        registry.report_dangling();
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&ContentType> {
        self.index.get(id).map(|&i| &self.types[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Content type claiming `relative_dir` through its `location` prefix.
    ///
    /// The longest matching location wins, so `posts/drafts` beats `posts`.
    pub fn by_location(&self, relative_dir: &str) -> Option<&ContentType> {
        self.types
            .iter()
            .filter_map(|ty| {
                let location = ty.location.as_deref()?.trim_matches('/');
                let claimed = relative_dir == location
                    || relative_dir
                        .strip_prefix(location)
                        .is_some_and(|rest| rest.starts_with('/'));
                claimed.then_some((location.len(), ty))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, ty)| ty)
    }

    fn report_dangling(&self) {
        for ty in &self.types {
            for (name, relation) in &ty.relations {
                if !self.contains(&relation.references) {
                    log!("warn"; "content type `{}`: relation `{name}` references unknown type `{}`", ty.id, relation.references);
                }
            }
            for (name, local) in &ty.local {
                if !self.contains(&local.references) {
                    log!("warn"; "content type `{}`: local `{name}` references unknown type `{}`", ty.id, local.references);
                }
                if let ForeignKey::Unknown(command) = &local.foreign_key {
                    log!("warn"; "content type `{}`: local `{name}` uses unknown command `${command}`, skipped", ty.id);
                }
            }
        }
    }
}
