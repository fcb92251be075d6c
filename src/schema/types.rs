//! Content type definitions.
//!
//! A content type is decoded from one YAML file:
//!
//! ```yaml
//! id: post
//! location: posts            # documents under content/posts/ get this type
//! template: blog.post        # default template id
//! rss: true
//!
//! properties:
//!   title: { type: string }
//!   featured: { type: bool, required: false, default: false }
//!   publication: { type: date, format: "%Y-%m-%d" }
//!
//! relations:
//!   authors: { references: author, join: many, sort: name }
//!
//! site:                      # named site-wide lists
//!   recent: { sort: publication, order: desc, limit: 5 }
//!
//! local:                     # per-document navigation
//!   prev: { references: post, foreign_key: $prev, sort: publication }
//!   related: { references: post, foreign_key: $same.tags, limit: 3 }
//!
//! pagination:
//!   slug: "blog/page/{{number}}"
//!   root: blog
//!   template: blog.list
//!   query: { sort: publication, order: desc, limit: 10 }
//! ```

use super::error::SchemaError;
use crate::{content::Value, utils::date::parse_date};
use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;

/// Marker that turns a local-query foreign key into a navigation command.
pub const COMMAND_MARKER: char = '$';

// ============================================================================
// Enums
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    /// Single identifier, wrapped as a one-element list.
    #[default]
    One,
    /// List of identifiers, or a comma-delimited string.
    Many,
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Int,
    Double,
    Bool,
    /// `format` is a chrono format string tried before the built-in ones.
    Date { format: Option<String> },
}

impl PropertyType {
    fn parse(name: &str, format: Option<String>) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "int" => Self::Int,
            "double" => Self::Double,
            "bool" => Self::Bool,
            "date" => Self::Date { format },
            _ => return None,
        })
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Date { .. } => "date",
        }
    }

    /// Typed extraction: returns `None` when `value` cannot represent this type.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Int(_) | Value::Double(_) | Value::Bool(_) | Value::Date(_)) => {
                value.to_plain_string().map(Value::String)
            }

            (Self::Int, Value::Int(_)) => Some(value.clone()),
            (Self::Int, Value::Double(d)) if d.fract() == 0.0 => Some(Value::Int(*d as i64)),
            (Self::Int, Value::String(s)) => s.trim().parse().ok().map(Value::Int),

            (Self::Double, Value::Double(_)) => Some(value.clone()),
            (Self::Double, Value::Int(i)) => Some(Value::Double(*i as f64)),
            (Self::Double, Value::String(s)) => s.trim().parse().ok().map(Value::Double),

            (Self::Bool, Value::Bool(_)) => Some(value.clone()),
            (Self::Bool, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            (Self::Date { .. }, Value::Date(_)) => Some(value.clone()),
            (Self::Date { format }, Value::String(s)) => {
                parse_date(s, format.as_deref()).map(Value::Date)
            }

            _ => None,
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// A typed property of a content type.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub kind: PropertyType,
    /// Missing required properties without a default are reported at load.
    pub required: bool,
    pub default: Option<Value>,
}

/// Outcome of reading one declared property from front matter.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Present and representable as the declared type.
    Typed(Value),
    /// Absent (or null), so the declared default applies.
    Default(Value),
    /// Present but not of the declared type. Kept as written.
    Mistyped(Value),
    Absent,
}

impl PropertySpec {
    /// Typed value for a raw front-matter entry.
    ///
    /// The default only fills in for a missing key, never for a value that
    /// fails to coerce.
    pub fn extract(&self, raw: Option<&Value>) -> Extracted {
        match raw {
            None | Some(Value::Null) => self
                .default
                .clone()
                .map_or(Extracted::Absent, Extracted::Default),
            Some(value) => self
                .kind
                .coerce(value)
                .map_or_else(|| Extracted::Mistyped(value.clone()), Extracted::Typed),
        }
    }
}

/// A declared join to documents of another (or the same) type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationSpec {
    pub references: String,
    #[serde(default)]
    pub join: Join,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Filter method. Only equality is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    Equals,
}

/// A single `field <method> value` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub field: String,
    pub method: FilterMethod,
    pub value: String,
}

/// Sort, filter and limit over a document collection (applied in that order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Query {
    pub sort: Option<String>,
    pub order: Order,
    pub limit: Option<usize>,
    pub filter: Option<Filter>,
}

/// Decoded local-query foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKey {
    /// Back-reference: a field on the referenced documents holding our id.
    Field(String),
    /// `$prev`
    Prev,
    /// `$next`
    Next,
    /// `$same.<field>`
    Same(String),
    /// Unrecognized `$command`. Kept so the schema still loads; resolves to nothing.
    Unknown(String),
}

impl ForeignKey {
    /// Decode a foreign-key expression.
    ///
    /// Unknown commands decode to [`ForeignKey::Unknown`]; structurally broken
    /// expressions are rejected.
    pub fn parse(expression: &str) -> Result<Self, String> {
        let Some(command) = expression.strip_prefix(COMMAND_MARKER) else {
            if expression.trim().is_empty() {
                return Err("foreign key is empty".into());
            }
            return Ok(Self::Field(expression.to_owned()));
        };

        let mut parts = command.split('.');
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("", _) => Err(format!("missing command after `{COMMAND_MARKER}`")),
            ("prev", []) => Ok(Self::Prev),
            ("next", []) => Ok(Self::Next),
            ("prev" | "next", _) => Err(format!("`{COMMAND_MARKER}{name}` takes no argument")),
            ("same", [field]) if !field.is_empty() => Ok(Self::Same((*field).to_owned())),
            ("same", _) => Err(format!(
                "`{COMMAND_MARKER}same` expects one field, e.g. `{COMMAND_MARKER}same.tags`"
            )),
            (other, _) => Ok(Self::Unknown(other.to_owned())),
        }
    }
}

/// A per-document navigational list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalQuery {
    pub references: String,
    pub foreign_key: ForeignKey,
    pub sort: Option<String>,
    pub order: Order,
    pub limit: Option<usize>,
}

/// Paginated list output of a content type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pagination {
    /// Page slug template; `{{number}}` and `{{total}}` are substituted.
    pub slug: String,
    /// Path that also receives the first page, e.g. `blog` for `/blog/`.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    /// `limit` is the page size.
    #[serde(default)]
    pub query: Query,
}

/// A content type: the schema shared by a class of documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentType {
    pub id: String,
    /// Path prefix (relative to the content dir) assigning documents to this type.
    pub location: Option<String>,
    pub template: Option<String>,
    /// Include documents of this type in the RSS feed.
    pub rss: bool,
    pub properties: BTreeMap<String, PropertySpec>,
    pub relations: BTreeMap<String, RelationSpec>,
    pub site: BTreeMap<String, Query>,
    pub local: BTreeMap<String, LocalQuery>,
    pub pagination: Option<Pagination>,
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProperty {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLocalQuery {
    references: String,
    foreign_key: String,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    order: Order,
    #[serde(default)]
    limit: Option<usize>,
}

impl ContentType {
    /// Decode a content type from YAML.
    ///
    /// `fallback_id` (usually the file stem) is used when the file has no `id`.
    /// Every section is decoded separately so errors name the offending field.
    pub fn from_yaml(source: &str, fallback_id: &str) -> Result<Self, SchemaError> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(source).map_err(|source| SchemaError::Parse {
                type_id: fallback_id.to_owned(),
                source,
            })?;

        let empty = serde_yaml::Mapping::new();
        let mapping = document.as_mapping().unwrap_or(&empty);
        let section = |key: &str| mapping.get(key).filter(|v| !v.is_null());

        let id = section("id")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or(fallback_id)
            .to_owned();

        let mut content_type = Self {
            location: decode_optional(&id, "location", section("location"))?,
            template: decode_optional(&id, "template", section("template"))?,
            rss: decode_optional(&id, "rss", section("rss"))?.unwrap_or(false),
            pagination: decode_optional(&id, "pagination", section("pagination"))?,
            ..Self::default()
        };

        for (name, raw) in decode_section::<RawProperty>(&id, "properties", section("properties"))? {
            let field = format!("properties.{name}");
            let spec = property_spec(&id, &field, raw)?;
            content_type.properties.insert(name, spec);
        }

        content_type.relations = decode_section(&id, "relations", section("relations"))?
            .into_iter()
            .collect();
        content_type.site = decode_section(&id, "site", section("site"))?
            .into_iter()
            .collect();

        for (name, raw) in decode_section::<RawLocalQuery>(&id, "local", section("local"))? {
            let foreign_key = ForeignKey::parse(&raw.foreign_key).map_err(|reason| {
                SchemaError::InvalidForeignKey {
                    type_id: id.clone(),
                    field: format!("local.{name}.foreign_key"),
                    expression: raw.foreign_key.clone(),
                    reason,
                }
            })?;
            content_type.local.insert(
                name,
                LocalQuery {
                    references: raw.references,
                    foreign_key,
                    sort: raw.sort,
                    order: raw.order,
                    limit: raw.limit,
                },
            );
        }

        content_type.id = id;
        content_type.validate()?;
        Ok(content_type)
    }

    /// Structural checks that do not need other content types.
    ///
    /// A relation that shares its name with a declared property reads its
    /// identifiers from that property, so the property must be a string.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for name in self.relations.keys() {
            if let Some(property) = self.properties.get(name)
                && property.kind != PropertyType::String
            {
                return Err(SchemaError::RelationPropertyConflict {
                    type_id: self.id.clone(),
                    relation: name.clone(),
                    found: property.kind.name(),
                });
            }
        }
        Ok(())
    }

    /// Template used for documents of this type unless they override it.
    pub fn template_or_default(&self) -> &str {
        self.template.as_deref().unwrap_or(super::DEFAULT_TEMPLATE)
    }
}

fn property_spec(type_id: &str, field: &str, raw: RawProperty) -> Result<PropertySpec, SchemaError> {
    let kind = PropertyType::parse(&raw.kind, raw.format).ok_or_else(|| {
        SchemaError::UnknownPropertyType {
            type_id: type_id.to_owned(),
            field: field.to_owned(),
            found: raw.kind.clone(),
        }
    })?;

    let default = match raw.default {
        None | Some(serde_yaml::Value::Null) => None,
        Some(value) => Some(kind.coerce(&Value::from_yaml(value)).ok_or_else(|| {
            SchemaError::InvalidDefault {
                type_id: type_id.to_owned(),
                field: field.to_owned(),
                expected: kind.name(),
            }
        })?),
    };

    Ok(PropertySpec {
        kind,
        required: raw.required.unwrap_or(true),
        default,
    })
}

fn decode<T: DeserializeOwned>(
    type_id: &str,
    field: &str,
    value: &serde_yaml::Value,
) -> Result<T, SchemaError> {
    serde_yaml::from_value(value.clone()).map_err(|source| SchemaError::Field {
        type_id: type_id.to_owned(),
        field: field.to_owned(),
        source,
    })
}

fn decode_optional<T: DeserializeOwned>(
    type_id: &str,
    field: &str,
    value: Option<&serde_yaml::Value>,
) -> Result<Option<T>, SchemaError> {
    value.map(|v| decode(type_id, field, v)).transpose()
}

/// Decode a `name -> T` section entry by entry, naming `section.name` on error.
fn decode_section<T: DeserializeOwned>(
    type_id: &str,
    section: &str,
    value: Option<&serde_yaml::Value>,
) -> Result<Vec<(String, T)>, SchemaError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let entries: BTreeMap<String, serde_yaml::Value> = decode(type_id, section, value)?;
    entries
        .into_iter()
        .map(|(name, entry)| {
            let item = decode(type_id, &format!("{section}.{name}"), &entry)?;
            Ok((name, item))
        })
        .collect()
}
