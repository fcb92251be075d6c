//! In-memory document store.
//!
//! Built once per build from the loader's output and read-only afterwards,
//! so rayon workers share it without locking.

use super::document::{Document, RawDocument};
use crate::{log, schema::Registry};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Identity errors. Fatal: nothing is rendered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate slugs: {}", format_list(.0))]
    DuplicateSlugs(Vec<String>),

    #[error("unknown content types: {}", format_list(.0))]
    UnknownContentTypes(Vec<String>),
}

fn format_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("`{item}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// All documents of a build, indexed by slug, id and content type.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    by_slug: FxHashMap<String, usize>,
    /// Identifiers are only unique per content type.
    by_id: FxHashMap<(String, String), usize>,
    /// Load order per content type.
    by_type: FxHashMap<String, Vec<usize>>,
}

impl DocumentStore {
    /// Validate identities and extract typed properties.
    ///
    /// Every duplicate slug is reported, not only the first. Documents of an
    /// unknown content type are rejected the same way.
    pub fn new(registry: &Registry, raw: Vec<RawDocument>) -> Result<Self, StoreError> {
        let mut slug_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &raw {
            *slug_counts.entry(doc.slug.as_str()).or_default() += 1;
        }
        let duplicates: Vec<String> = slug_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(slug, _)| slug.to_owned())
            .collect();
        if !duplicates.is_empty() {
            return Err(StoreError::DuplicateSlugs(duplicates));
        }

        let mut unknown: Vec<String> = raw
            .iter()
            .filter(|doc| !registry.contains(&doc.content_type))
            .map(|doc| format!("{} ({})", doc.content_type, doc.path.display()))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(StoreError::UnknownContentTypes(unknown));
        }

        let mut store = Self::default();
        for raw in raw {
            let Some(content_type) = registry.get(&raw.content_type) else {
                continue;
            };
            let (doc, issues) = Document::new(raw, content_type);
            for field in issues.missing {
                log!("warn"; "{} `{}` ({}) is missing required property `{field}`", doc.content_type, doc.slug, doc.path.display());
            }
            for (field, expected) in issues.mistyped {
                log!("warn"; "{} `{}` ({}): `{field}` is not a {expected}, kept as written", doc.content_type, doc.slug, doc.path.display());
            }
            store.insert(doc);
        }

        Ok(store)
    }

    fn insert(&mut self, doc: Document) {
        let index = self.documents.len();
        self.by_slug.insert(doc.slug.clone(), index);
        self.by_id
            .entry((doc.content_type.clone(), doc.id.clone()))
            .or_insert(index);
        self.by_type
            .entry(doc.content_type.clone())
            .or_default()
            .push(index);
        self.documents.push(doc);
    }

    pub fn get(&self, slug: &str) -> Option<&Document> {
        self.by_slug.get(slug).map(|&i| &self.documents[i])
    }

    /// Document of `content_type` with identifier `id`.
    pub fn by_id(&self, content_type: &str, id: &str) -> Option<&Document> {
        self.by_id
            .get(&(content_type.to_owned(), id.to_owned()))
            .map(|&i| &self.documents[i])
    }

    /// Documents of one content type, in load order. Unknown types are empty.
    pub fn of_type(&self, content_type: &str) -> Vec<&Document> {
        self.by_type
            .get(content_type)
            .map(|indices| indices.iter().map(|&i| &self.documents[i]).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{Map, Value, document::tests::raw},
        map,
        schema::ContentType,
    };

    fn registry() -> Registry {
        let post = ContentType::from_yaml("id: post\nproperties:\n  title: { type: string }\n", "post").unwrap();
        let author = ContentType::from_yaml("id: author\n", "author").unwrap();
        Registry::load(vec![post, author], vec![]).unwrap()
    }

    #[test]
    fn test_every_duplicate_slug_reported() {
        let mut docs = vec![
            raw("post", "a", Map::new()),
            raw("post", "b", Map::new()),
            raw("post", "c", Map::new()),
            raw("post", "d", Map::new()),
        ];
        docs[1].slug = "same".into();
        docs[2].slug = "same".into();
        docs[3].slug = "post/a".into();

        let err = DocumentStore::new(&registry(), docs).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateSlugs(vec!["post/a".into(), "same".into()])
        );
        assert!(err.to_string().contains("`post/a`, `same`"));
    }

    #[test]
    fn test_unknown_content_type_rejected() {
        let err = DocumentStore::new(&registry(), vec![raw("note", "n", Map::new())]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownContentTypes(types) if types[0].starts_with("note")));
    }

    #[test]
    fn test_indexes() {
        let store = DocumentStore::new(
            &registry(),
            vec![
                raw("post", "b", map! { "title" => "B" }),
                raw("author", "ada", Map::new()),
                raw("post", "a", map! { "title" => "A" }),
            ],
        )
        .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("post/a").unwrap().id, "a");
        assert_eq!(store.by_id("author", "ada").unwrap().slug, "author/ada");
        assert!(store.by_id("post", "ada").is_none());

        let ids: Vec<_> = store.of_type("post").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert!(store.of_type("ghost").is_empty());
    }

    #[test]
    fn test_property_issues_do_not_reject_documents() {
        let store = DocumentStore::new(
            &registry(),
            vec![
                raw("post", "untitled", Map::new()),
                raw("post", "listed", map! { "title" => vec![Value::from("a"), Value::from("b")] }),
            ],
        )
        .unwrap();

        let listed = store.get("post/listed").unwrap();
        assert_eq!(listed.properties["title"], Value::List(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(listed.path, std::path::Path::new("content/post/listed.md"));
        assert!(!store.get("post/untitled").unwrap().properties.contains_key("title"));
    }
}
