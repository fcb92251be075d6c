//! Per-document context resolution.
//!
//! A document context is built from layers merged in order, later layers
//! winning key by key:
//!
//! | Layer      | Keys                                                      |
//! |------------|-----------------------------------------------------------|
//! | base       | `id`, `slug`, `permalink`, `contentType`, dates, title    |
//! | content    | `contents`, `readingTime`, `toc` (cached per slug)        |
//! | properties | declared properties, typed and defaulted                  |
//! | relations  | one list per declared relation                            |
//! | local      | one list per local query, only for the rendered document |
//!
//! Related documents are expanded recursively with a depth budget, so
//! cyclic relations terminate.

use super::cache::{ContentContext, ContextCache};
use crate::{
    content::{Document, DocumentStore, Map, Value, merge, query::sort_by_field},
    log,
    render::{
        markdown::{MarkdownRenderer, html_toc, reading_time},
        transform::Transformer,
    },
    schema::{ForeignKey, Join, LocalQuery, Query, Registry, RelationSpec},
};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Relation expansion budget of a rendered document: its related documents
/// carry their own relations, whose documents carry none.
pub const RELATION_DEPTH: usize = 2;

/// Absolute (or root-relative without a base URL) link to a slug.
pub fn permalink(base_url: &str, slug: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if slug.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{slug}/")
    }
}

pub struct Resolver<'a> {
    registry: &'a Registry,
    store: &'a DocumentStore,
    cache: &'a ContextCache,
    renderer: &'a dyn MarkdownRenderer,
    transformer: Option<&'a dyn Transformer>,
    base_url: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a Registry,
        store: &'a DocumentStore,
        cache: &'a ContextCache,
        renderer: &'a dyn MarkdownRenderer,
        base_url: &'a str,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            renderer,
            transformer: None,
            base_url,
        }
    }

    pub fn with_transformer(mut self, transformer: &'a dyn Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub const fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub const fn store(&self) -> &'a DocumentStore {
        self.store
    }

    pub const fn base_url(&self) -> &'a str {
        self.base_url
    }

    // ========================================================================
    // Layers
    // ========================================================================

    pub fn base_context(&self, doc: &Document) -> Map {
        let mut base = crate::map! {
            "id" => doc.id.as_str(),
            "slug" => doc.slug.as_str(),
            "permalink" => permalink(self.base_url, &doc.slug),
            "contentType" => doc.content_type.as_str(),
            "publication" => doc.publication,
            "lastUpdate" => doc.last_modification,
        };
        for key in ["title", "description"] {
            if let Some(value) = doc.front_matter().get(key) {
                base.insert(key.to_owned(), value.clone());
            }
        }
        base
    }

    /// Rendered content, computed once per slug and build.
    pub fn content(&self, doc: &Document) -> Arc<ContentContext> {
        self.cache
            .get_or_compute(&doc.slug, || self.render_content(doc))
    }

    fn render_content(&self, doc: &Document) -> ContentContext {
        let transformed = self.transformer.and_then(|transformer| {
            transformer
                .transform(&doc.markdown, &doc.content_type)
                .unwrap_or_else(|err| {
                    log!("error"; "{} `{}`: transform failed, using original content: {err:#}", doc.content_type, doc.slug);
                    None
                })
        });

        let (contents, toc) = match transformed {
            Some(result) if !result.is_markdown => {
                let toc = html_toc(&result.content);
                (result.content, toc)
            }
            Some(result) => {
                let rendered = self.renderer.render(&result.content);
                (rendered.html, rendered.toc)
            }
            None => {
                let rendered = self.renderer.render(&doc.markdown);
                (rendered.html, rendered.toc)
            }
        };

        ContentContext {
            reading_time: reading_time(&contents),
            contents,
            toc,
        }
    }

    /// Every declared relation, expanded with `depth - 1` budget.
    pub fn relations(&self, doc: &Document, depth: usize) -> Map {
        let Some(content_type) = self.registry.get(&doc.content_type) else {
            return Map::new();
        };
        content_type
            .relations
            .iter()
            .map(|(name, relation)| {
                let related = self.related_documents(doc, name, relation);
                (name.clone(), self.expand(&related, depth.saturating_sub(1)))
            })
            .collect()
    }

    /// Documents a relation named `name` points at, sorted and limited.
    pub fn related_documents(
        &self,
        doc: &Document,
        name: &str,
        relation: &RelationSpec,
    ) -> Vec<&'a Document> {
        let mut seen = FxHashSet::default();
        let related: Vec<&Document> = doc
            .reference_ids(name, relation.join)
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .filter_map(|id| self.store.by_id(&relation.references, &id))
            .collect();

        Query {
            sort: relation.sort.clone(),
            order: relation.order,
            limit: relation.limit,
            filter: None,
        }
        .apply(related)
    }

    /// Base, content, properties and, with a remaining budget, relations.
    pub fn standard_context(&self, doc: &Document, depth: usize) -> Map {
        let mut context = self.base_context(doc);
        merge(&mut context, self.content(doc).to_map());
        merge(&mut context, doc.properties.clone());
        if depth > 0 {
            merge(&mut context, self.relations(doc, depth));
        }
        context
    }

    /// Context of the rendered document: standard layers plus local queries.
    pub fn full_context(&self, doc: &Document) -> Map {
        let mut context = self.standard_context(doc, RELATION_DEPTH);
        merge(&mut context, self.local_context(doc));
        context
    }

    pub fn local_context(&self, doc: &Document) -> Map {
        let Some(content_type) = self.registry.get(&doc.content_type) else {
            return Map::new();
        };
        content_type
            .local
            .iter()
            .filter_map(|(name, query)| {
                let documents = self.local_documents(doc, query)?;
                Some((name.clone(), self.expand(&documents, RELATION_DEPTH - 1)))
            })
            .collect()
    }

    /// Documents of one local query. `None` for unknown commands.
    pub fn local_documents(&self, doc: &Document, query: &LocalQuery) -> Option<Vec<&'a Document>> {
        let mut candidates = self.store.of_type(&query.references);

        let documents = match &query.foreign_key {
            ForeignKey::Prev | ForeignKey::Next => {
                sort_by_field(&mut candidates, query.sort.as_deref(), query.order);
                let position = candidates.iter().position(|d| d.slug == doc.slug);
                let neighbour = match (&query.foreign_key, position) {
                    (ForeignKey::Prev, Some(i)) => i.checked_sub(1),
                    (ForeignKey::Next, Some(i)) => Some(i + 1),
                    _ => None,
                };
                return Some(
                    neighbour
                        .and_then(|i| candidates.get(i).copied())
                        .into_iter()
                        .collect(),
                );
            }
            ForeignKey::Same(field) => {
                let own: FxHashSet<String> = doc.value_set(field).into_iter().collect();
                candidates.retain(|other| {
                    other.slug != doc.slug
                        && other.value_set(field).iter().any(|v| own.contains(v))
                });
                candidates
            }
            ForeignKey::Field(field) => {
                candidates.retain(|other| {
                    other
                        .reference_ids(field, Join::Many)
                        .iter()
                        .any(|id| *id == doc.id)
                });
                candidates
            }
            ForeignKey::Unknown(_) => return None,
        };

        Some(
            Query {
                sort: query.sort.clone(),
                order: query.order,
                limit: query.limit,
                filter: None,
            }
            .apply(documents),
        )
    }

    /// Expand documents to their standard contexts.
    pub fn expand(&self, documents: &[&Document], depth: usize) -> Value {
        Value::List(
            documents
                .iter()
                .map(|doc| Value::Map(self.standard_context(doc, depth)))
                .collect(),
        )
    }
}

/// Log, once per document, relation identifiers that match no document.
///
/// Returns the number of documents with unresolved references.
pub fn report_unresolved_references(registry: &Registry, store: &DocumentStore) -> usize {
    let mut affected = 0;
    for doc in store.iter() {
        let Some(content_type) = registry.get(&doc.content_type) else {
            continue;
        };
        let missing: Vec<String> = content_type
            .relations
            .iter()
            .flat_map(|(name, relation)| {
                doc.reference_ids(name, relation.join)
                    .into_iter()
                    .filter(|id| store.by_id(&relation.references, id).is_none())
                    .map(move |id| format!("{name} → {}:{id}", relation.references))
            })
            .collect();

        if !missing.is_empty() {
            affected += 1;
            log!("warn"; "{} `{}` has unresolved references: {}", doc.content_type, doc.slug, missing.join(", "));
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{RawDocument, document::tests::raw},
        map,
        render::{
            markdown::{CommonMark, RenderedMarkdown},
            transform::{TransformError, Transformed},
        },
        schema::ContentType,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const POST: &str = r#"
id: post
properties:
  title: { type: string }
  tags: { type: string, required: false }
relations:
  authors: { references: author, join: many, sort: name }
local:
  prev: { references: post, foreign_key: $prev, sort: publication }
  next: { references: post, foreign_key: $next, sort: publication }
  related: { references: post, foreign_key: $same.tags, limit: 5 }
  odd: { references: post, foreign_key: $random }
"#;

    const AUTHOR: &str = r#"
id: author
properties:
  name: { type: string }
relations:
  team: { references: team }
local:
  posts: { references: post, foreign_key: authors, sort: publication, order: desc }
"#;

    const TEAM: &str = r#"
id: team
relations:
  members: { references: author, join: many }
"#;

    struct Fixture {
        registry: Registry,
        store: DocumentStore,
        cache: ContextCache,
    }

    impl Fixture {
        fn new(docs: Vec<RawDocument>) -> Self {
            let types = [("post", POST), ("author", AUTHOR), ("team", TEAM)]
                .into_iter()
                .map(|(id, yaml)| ContentType::from_yaml(yaml, id).unwrap())
                .collect();
            let registry = Registry::load(types, vec![]).unwrap();
            let store = DocumentStore::new(&registry, docs).unwrap();
            Self {
                registry,
                store,
                cache: ContextCache::new(),
            }
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver::new(&self.registry, &self.store, &self.cache, &CommonMark, "https://k.dev")
        }

        fn doc(&self, slug: &str) -> &Document {
            self.store.get(slug).unwrap()
        }
    }

    fn post(id: &str, day: u32, front_matter: Map) -> RawDocument {
        let mut doc = raw("post", id, front_matter);
        doc.publication = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        doc
    }

    fn blog() -> Fixture {
        Fixture::new(vec![
            post("b", 2, map! { "title" => "B", "authors" => "grace, ada", "tags" => vec![Value::from("rust")] }),
            post("a", 1, map! { "title" => "A", "authors" => "ada", "tags" => vec![Value::from("rust"), Value::from("web")] }),
            post("c", 3, map! { "title" => "C", "tags" => "web" }),
            post("d", 4, map! { "title" => "D", "tags" => "go" }),
            raw("author", "ada", map! { "name" => "Ada", "team" => "core" }),
            raw("author", "grace", map! { "name" => "Grace" }),
            raw("team", "core", map! { "members" => "ada, grace" }),
        ])
    }

    fn ids(value: &Value) -> Vec<String> {
        value
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_map().unwrap()["id"].as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn test_permalink() {
        assert_eq!(permalink("https://k.dev/", ""), "https://k.dev/");
        assert_eq!(permalink("https://k.dev", "post/a"), "https://k.dev/post/a/");
        assert_eq!(permalink("", "about"), "/about/");
    }

    #[test]
    fn test_full_context_layers() {
        let fixture = blog();
        let context = fixture.resolver().full_context(fixture.doc("post/a"));

        assert_eq!(context["id"], Value::from("a"));
        assert_eq!(context["permalink"], Value::from("https://k.dev/post/a/"));
        assert_eq!(context["contentType"], Value::from("post"));
        assert_eq!(context["title"], Value::from("A"));
        assert!(context["contents"].as_str().unwrap().contains("<h1 id=\"a\">a</h1>"));
        assert_eq!(context["readingTime"], Value::Int(1));
        assert!(context.contains_key("toc"));
        assert!(context["publication"].as_date().is_some());
    }

    #[test]
    fn test_relations_sorted_and_resolved() {
        let fixture = blog();
        let context = fixture.resolver().full_context(fixture.doc("post/b"));

        // sorted by name: Ada before Grace
        assert_eq!(ids(&context["authors"]), ["ada", "grace"]);
    }

    #[test]
    fn test_relation_depth_is_bounded() {
        let fixture = blog();
        let context = fixture.resolver().full_context(fixture.doc("post/a"));

        let ada = context["authors"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(ada["name"], Value::from("Ada"));

        let team = ada["team"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(team["id"], Value::from("core"));
        assert!(team.contains_key("contents"));
        assert!(!team.contains_key("members"));

        // local queries are never part of nested contexts
        assert!(!ada.contains_key("posts"));
    }

    #[test]
    fn test_prev_next_boundaries() {
        let fixture = blog();
        let resolver = fixture.resolver();

        let first = resolver.full_context(fixture.doc("post/a"));
        assert!(ids(&first["prev"]).is_empty());
        assert_eq!(ids(&first["next"]), ["b"]);

        let last = resolver.full_context(fixture.doc("post/d"));
        assert_eq!(ids(&last["prev"]), ["c"]);
        assert!(ids(&last["next"]).is_empty());
    }

    #[test]
    fn test_prev_next_from_the_middle() {
        let fixture = Fixture::new(
            [("e", 5), ("b", 2), ("d", 4), ("a", 1), ("c", 3)]
                .into_iter()
                .map(|(id, day)| post(id, day, map! { "title" => id.to_uppercase() }))
                .collect(),
        );
        let context = fixture.resolver().full_context(fixture.doc("post/c"));

        assert_eq!(ids(&context["prev"]), ["b"]);
        assert_eq!(ids(&context["next"]), ["d"]);
    }

    #[test]
    fn test_repeated_reference_ids_expand_once() {
        let fixture = Fixture::new(vec![
            post("x", 1, map! { "title" => "X", "authors" => "ada, ada , grace, ada" }),
            raw("author", "ada", map! { "name" => "Ada" }),
            raw("author", "grace", map! { "name" => "Grace" }),
        ]);
        let context = fixture.resolver().full_context(fixture.doc("post/x"));

        assert_eq!(ids(&context["authors"]), ["ada", "grace"]);
    }

    #[test]
    fn test_same_field_matches_written_values_not_defaults() {
        let note = ContentType::from_yaml(
            "properties:\n  tags: { type: string, required: false, default: misc }\nlocal:\n  related: { references: note, foreign_key: $same.tags }\n",
            "note",
        )
        .unwrap();
        let registry = Registry::load(vec![note], vec![]).unwrap();
        let store = DocumentStore::new(
            &registry,
            vec![
                raw("note", "a", map! { "tags" => vec![Value::from("x")] }),
                raw("note", "b", map! { "tags" => vec![Value::from("x")] }),
                raw("note", "c", map! { "tags" => vec![Value::from("y")] }),
                raw("note", "d", Map::new()),
                raw("note", "e", Map::new()),
            ],
        )
        .unwrap();
        let cache = ContextCache::new();
        let resolver = Resolver::new(&registry, &store, &cache, &CommonMark, "");
        let context = |slug: &str| resolver.full_context(store.get(slug).unwrap());

        let a = context("note/a");
        assert_eq!(ids(&a["related"]), ["b"]);
        assert_eq!(a["tags"], Value::List(vec![Value::from("x")]));
        assert!(ids(&context("note/c")["related"]).is_empty());
        // absent keys share the default
        assert_eq!(ids(&context("note/d")["related"]), ["e"]);
    }

    #[test]
    fn test_same_field_is_symmetric_and_excludes_self() {
        let fixture = blog();
        let resolver = fixture.resolver();

        let a = resolver.full_context(fixture.doc("post/a"));
        let c = resolver.full_context(fixture.doc("post/c"));
        let d = resolver.full_context(fixture.doc("post/d"));

        assert_eq!(ids(&a["related"]), ["b", "c"]);
        assert!(ids(&c["related"]).contains(&"a".to_owned()));
        assert!(!ids(&a["related"]).contains(&"a".to_owned()));
        assert!(ids(&d["related"]).is_empty());
    }

    #[test]
    fn test_back_reference() {
        let fixture = blog();
        let context = fixture.resolver().full_context(fixture.doc("author/ada"));

        // posts listing ada, newest first
        assert_eq!(ids(&context["posts"]), ["b", "a"]);
    }

    #[test]
    fn test_unknown_command_skipped() {
        let fixture = blog();
        let context = fixture.resolver().full_context(fixture.doc("post/a"));
        assert!(!context.contains_key("odd"));
    }

    #[test]
    fn test_unresolved_reference_is_empty() {
        let fixture = Fixture::new(vec![post("x", 1, map! { "title" => "X", "authors" => "nobody" })]);
        let context = fixture.resolver().full_context(fixture.doc("post/x"));

        assert!(context["authors"].as_list().unwrap().is_empty());
        assert_eq!(report_unresolved_references(&fixture.registry, &fixture.store), 1);
    }

    #[test]
    fn test_local_documents_for_absent_self() {
        let fixture = blog();
        let resolver = fixture.resolver();
        let query = LocalQuery {
            references: "author".into(),
            foreign_key: ForeignKey::Next,
            sort: None,
            order: Default::default(),
            limit: None,
        };
        let documents = resolver.local_documents(fixture.doc("post/a"), &query).unwrap();
        assert!(documents.is_empty());
    }

    struct Counting(AtomicUsize);

    impl MarkdownRenderer for Counting {
        fn render(&self, markdown: &str) -> RenderedMarkdown {
            self.0.fetch_add(1, Ordering::SeqCst);
            RenderedMarkdown {
                html: format!("<p>{}</p>", markdown.len()),
                toc: Vec::new(),
            }
        }
    }

    #[test]
    fn test_content_rendered_once_across_contexts() {
        let fixture = blog();
        let renderer = Counting(AtomicUsize::new(0));
        let resolver = Resolver::new(&fixture.registry, &fixture.store, &fixture.cache, &renderer, "");

        // ada appears in two posts and in her own page
        resolver.full_context(fixture.doc("post/a"));
        resolver.full_context(fixture.doc("post/b"));
        resolver.full_context(fixture.doc("author/ada"));

        assert_eq!(renderer.0.load(Ordering::SeqCst), fixture.cache.len());
    }

    struct Failing;

    impl Transformer for Failing {
        fn transform(&self, _: &str, _: &str) -> Result<Option<Transformed>, TransformError> {
            Err(TransformError::Encoding {
                command: "broken".into(),
            })
        }
    }

    struct ToHtml;

    impl Transformer for ToHtml {
        fn transform(&self, _: &str, _: &str) -> Result<Option<Transformed>, TransformError> {
            Ok(Some(Transformed {
                content: r#"<h2 id="x">X</h2><p>done</p>"#.into(),
                is_markdown: false,
            }))
        }
    }

    #[test]
    fn test_failed_transform_uses_original() {
        let fixture = blog();
        let resolver = fixture.resolver().with_transformer(&Failing);
        let context = resolver.full_context(fixture.doc("post/a"));
        assert!(context["contents"].as_str().unwrap().contains("Body of a."));
    }

    #[test]
    fn test_html_transform_skips_markdown() {
        let fixture = blog();
        let resolver = fixture.resolver().with_transformer(&ToHtml);
        let content = resolver.content(fixture.doc("post/a"));

        assert_eq!(content.contents, r#"<h2 id="x">X</h2><p>done</p>"#);
        assert_eq!(content.toc[0].fragment, "x");
    }
}
