//! Loaded content documents.

use super::value::{Map, Value};
use crate::schema::{ContentType, Extracted, Join};
use chrono::{DateTime, Utc};
use std::{borrow::Cow, path::PathBuf};

/// A document as produced by the loader, before schema extraction.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    /// Unique across the corpus. `""` is the site root.
    pub slug: String,
    pub content_type: String,
    pub front_matter: Map,
    /// Body with the front matter stripped.
    pub markdown: String,
    pub path: PathBuf,
    pub publication: DateTime<Utc>,
    pub last_modification: DateTime<Utc>,
}

/// Declared properties a document could not satisfy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PropertyIssues {
    /// Required, absent and without a default.
    pub missing: Vec<String>,
    /// Present but not of the declared type: `(property, expected type)`.
    pub mistyped: Vec<(String, &'static str)>,
}

/// A document with its typed properties. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub slug: String,
    pub content_type: String,
    pub markdown: String,
    /// Source file, for diagnostics.
    pub path: PathBuf,
    pub publication: DateTime<Utc>,
    pub last_modification: DateTime<Utc>,
    /// Declared properties: typed, defaulted when absent, or as written when
    /// they do not fit the declared type.
    pub properties: Map,
    front_matter: Map,
}

impl Document {
    /// Extract typed properties.
    pub fn new(raw: RawDocument, content_type: &ContentType) -> (Self, PropertyIssues) {
        let mut properties = Map::new();
        let mut issues = PropertyIssues::default();

        for (name, spec) in &content_type.properties {
            match spec.extract(raw.front_matter.get(name)) {
                Extracted::Typed(value) | Extracted::Default(value) => {
                    properties.insert(name.clone(), value);
                }
                Extracted::Mistyped(value) => {
                    issues.mistyped.push((name.clone(), spec.kind.name()));
                    properties.insert(name.clone(), value);
                }
                Extracted::Absent if spec.required => issues.missing.push(name.clone()),
                Extracted::Absent => {}
            }
        }

        let document = Self {
            id: raw.id,
            slug: raw.slug,
            content_type: raw.content_type,
            markdown: raw.markdown,
            path: raw.path,
            publication: raw.publication,
            last_modification: raw.last_modification,
            properties,
            front_matter: raw.front_matter,
        };
        (document, issues)
    }

    /// Raw decoded front matter, including undeclared keys.
    pub const fn front_matter(&self) -> &Map {
        &self.front_matter
    }

    /// Field lookup used by queries.
    ///
    /// Resolution order: identity fields, typed properties, raw front matter,
    /// then the built-in dates.
    pub fn query_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "id" => return Some(Cow::Owned(Value::from(self.id.as_str()))),
            "slug" => return Some(Cow::Owned(Value::from(self.slug.as_str()))),
            "contentType" => return Some(Cow::Owned(Value::from(self.content_type.as_str()))),
            _ => {}
        }

        if let Some(value) = self.properties.get(name).or_else(|| self.front_matter.get(name)) {
            return Some(Cow::Borrowed(value));
        }

        match name {
            "publication" => Some(Cow::Owned(Value::Date(self.publication))),
            "lastUpdate" => Some(Cow::Owned(Value::Date(self.last_modification))),
            _ => None,
        }
    }

    /// Front matter as written, then [`Document::query_field`].
    ///
    /// Identifier matching reads what the author wrote, so a declared default
    /// never stands in for a present value.
    fn written_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self.front_matter.get(name) {
            Some(Value::Null) | None => self.query_field(name),
            Some(value) => Some(Cow::Borrowed(value)),
        }
    }

    /// Stringified values of `field`: scalars are singletons, lists their elements.
    pub fn value_set(&self, field: &str) -> Vec<String> {
        self.written_field(field)
            .map(|value| value.value_set())
            .unwrap_or_default()
    }

    /// Identifiers a relation named `field` points at.
    ///
    /// `one` reads a scalar (or the first list element). `many` reads a list
    /// or a comma-delimited string.
    pub fn reference_ids(&self, field: &str, join: Join) -> Vec<String> {
        let Some(value) = self.written_field(field) else {
            return Vec::new();
        };

        match (join, value.as_ref()) {
            (Join::One, Value::List(items)) => items
                .first()
                .and_then(Value::to_plain_string)
                .into_iter()
                .collect(),
            (Join::One, other) => other.to_plain_string().into_iter().collect(),
            (Join::Many, Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect(),
            (Join::Many, other) => other.value_set(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{map, schema::ContentType};
    use chrono::TimeZone;

    /// Document fixture with a fixed publication date.
    pub(crate) fn raw(content_type: &str, id: &str, front_matter: Map) -> RawDocument {
        RawDocument {
            id: id.into(),
            slug: format!("{content_type}/{id}"),
            content_type: content_type.into(),
            front_matter,
            markdown: format!("# {id}\n\nBody of {id}."),
            path: PathBuf::from(format!("content/{content_type}/{id}.md")),
            publication: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_modification: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    fn post_type() -> ContentType {
        ContentType::from_yaml(
            "id: post\nproperties:\n  title: { type: string }\n  views: { type: int, required: false, default: 0 }\n  subtitle: { type: string, required: false }\n",
            "post",
        )
        .unwrap()
    }

    #[test]
    fn test_properties_typed_and_defaulted() {
        let (doc, issues) = Document::new(
            raw("post", "hello", map! { "title" => "Hello", "extra" => "raw" }),
            &post_type(),
        );

        assert_eq!(issues, PropertyIssues::default());
        assert_eq!(doc.properties["title"], Value::from("Hello"));
        assert_eq!(doc.properties["views"], Value::Int(0));
        assert!(!doc.properties.contains_key("subtitle"));
        assert!(!doc.properties.contains_key("extra"));
        assert_eq!(doc.front_matter()["extra"], Value::from("raw"));
    }

    #[test]
    fn test_missing_required_reported() {
        let (_, issues) = Document::new(raw("post", "untitled", Map::new()), &post_type());
        assert_eq!(issues.missing, ["title"]);
        assert!(issues.mistyped.is_empty());
    }

    #[test]
    fn test_default_never_replaces_written_value() {
        let tagged = ContentType::from_yaml(
            "properties:\n  tags: { type: string, required: false, default: misc }\n  views: { type: int, required: false, default: 0 }\n",
            "post",
        )
        .unwrap();

        let (doc, issues) = Document::new(
            raw("post", "a", map! { "tags" => vec![Value::from("x")], "views" => "many" }),
            &tagged,
        );
        assert_eq!(issues.mistyped, [("tags".to_owned(), "string"), ("views".to_owned(), "int")]);
        assert_eq!(doc.properties["tags"], Value::List(vec![Value::from("x")]));
        assert_eq!(doc.properties["views"], Value::from("many"));
        assert_eq!(doc.value_set("tags"), ["x"]);
        assert_eq!(doc.reference_ids("tags", Join::Many), ["x"]);

        let (untagged, issues) = Document::new(raw("post", "b", Map::new()), &tagged);
        assert_eq!(issues, PropertyIssues::default());
        assert_eq!(untagged.value_set("tags"), ["misc"]);
        assert_eq!(untagged.properties["views"], Value::Int(0));
    }

    #[test]
    fn test_query_field_order() {
        let (doc, _) = Document::new(
            raw("post", "hello", map! { "title" => "Hello", "status" => "draft" }),
            &post_type(),
        );

        assert_eq!(doc.query_field("id").unwrap().as_str(), Some("hello"));
        assert_eq!(doc.query_field("title").unwrap().as_str(), Some("Hello"));
        assert_eq!(doc.query_field("status").unwrap().as_str(), Some("draft"));
        assert!(doc.query_field("publication").unwrap().as_date().is_some());
        assert!(doc.query_field("nothing").is_none());
    }

    #[test]
    fn test_reference_ids_cardinality() {
        let (doc, _) = Document::new(
            raw(
                "post",
                "hello",
                map! {
                    "author" => "ada",
                    "authors" => "ada, grace ,",
                    "tags" => vec![Value::from("rust"), Value::from("web")],
                },
            ),
            &ContentType::default(),
        );

        assert_eq!(doc.reference_ids("author", Join::One), ["ada"]);
        assert_eq!(doc.reference_ids("authors", Join::Many), ["ada", "grace"]);
        assert_eq!(doc.reference_ids("tags", Join::Many), ["rust", "web"]);
        assert_eq!(doc.reference_ids("tags", Join::One), ["rust"]);
        assert!(doc.reference_ids("missing", Join::Many).is_empty());
    }
}
