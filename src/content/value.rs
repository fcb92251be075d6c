//! Dynamic values decoded from front matter and published into contexts.
//!
//! Front matter is loosely typed, so every decoded key lands in a [`Value`]:
//! a closed tagged union instead of an open dynamic type. Property specs
//! perform typed extraction on top of it (see `schema::PropertyType`).
//!
//! The same union is the unit of the rendering context: a [`Map`] of values
//! serialized to the template engine through `serde`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use std::{cmp::Ordering, collections::BTreeMap};

/// String-keyed map of values. Sorted keys keep contexts deterministic.
pub type Map = BTreeMap<String, Value>;

/// A front-matter or context value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Map(Map),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Map(value)
    }
}

impl Value {
    /// Convert a decoded YAML value. Tags are dropped, keys are stringified.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;
        match value {
            Yaml::Null => Self::Null,
            Yaml::Bool(b) => Self::Bool(b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Double),
            },
            Yaml::String(s) => Self::String(s),
            Yaml::Sequence(items) => Self::List(items.into_iter().map(Self::from_yaml).collect()),
            Yaml::Mapping(mapping) => Self::Map(
                mapping
                    .into_iter()
                    .filter_map(|(k, v)| yaml_key(k).map(|k| (k, Self::from_yaml(v))))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Convert a TOML value from the `[extra]` config table.
    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s.clone()),
            toml::Value::Integer(i) => Self::Int(*i),
            toml::Value::Float(f) => Self::Double(*f),
            toml::Value::Boolean(b) => Self::Bool(*b),
            toml::Value::Datetime(dt) => Self::String(dt.to_string()),
            toml::Value::Array(items) => Self::List(items.iter().map(Self::from_toml).collect()),
            toml::Value::Table(table) => Self::Map(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_toml(v)))
                    .collect(),
            ),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Stringified form of a scalar, used by filters and identifier lookups.
    ///
    /// Lists, maps and null have no plain form.
    pub fn to_plain_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Date(d) => Some(format_date(d)),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Scalars form a singleton set, lists contribute their elements.
    pub fn value_set(&self) -> Vec<String> {
        match self.as_list() {
            Some(items) => items.iter().filter_map(Self::to_plain_string).collect(),
            None => self.to_plain_string().into_iter().collect(),
        }
    }

    /// Zero value of this value's type, used when a sort field is missing.
    pub fn zero(&self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Bool(_) => Self::Bool(false),
            Self::Int(_) => Self::Int(0),
            Self::Double(_) => Self::Double(0.0),
            Self::String(_) => Self::String(String::new()),
            Self::Date(_) => Self::Date(DateTime::<Utc>::UNIX_EPOCH),
            Self::List(_) => Self::List(Vec::new()),
            Self::Map(_) => Self::Map(Map::new()),
        }
    }

    /// Total order between two present values.
    ///
    /// Numbers compare across int/double, otherwise values of different
    /// kinds fall back to a fixed kind rank.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Double(b)) => (*a as f64).total_cmp(b),
            (Self::Double(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Double(_) => 2,
            Self::String(_) => 3,
            Self::Date(_) => 4,
            Self::List(_) => 5,
            Self::Map(_) => 6,
        }
    }
}

/// Compare two possibly missing sort keys.
///
/// A missing (or null) key sorts as the zero value of the other side's type,
/// so an untitled page sorts like `""` among titles instead of crashing.
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(a), None) => a.compare(&a.zero()),
        (None, Some(b)) => b.zero().compare(b),
        (Some(a), Some(b)) => a.compare(b),
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 with second precision, e.g. `2024-01-15T00:00:00Z`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Recursive merge
// ============================================================================

/// Merge `overlay` into `base`.
///
/// Keys of `overlay` win at every depth: nested maps merge key by key,
/// any other value replaces what was there.
pub fn merge(base: &mut Map, overlay: Map) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Owned variant of [`merge`].
pub fn merged(mut base: Map, overlay: Map) -> Map {
    merge(&mut base, overlay);
    base
}

// ============================================================================
// Serialization
// ============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&format_date(d)),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Build a [`Map`] from `key => value` pairs.
#[macro_export]
macro_rules! map {
    () => { $crate::content::Map::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::content::Map::new();
        $( map.insert(::std::string::String::from($key), $crate::content::Value::from($value)); )+
        map
    }};
}
