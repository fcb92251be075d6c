//! Schema error types.

use thiserror::Error;

/// Errors raised while decoding or validating content type definitions.
///
/// All of them are fatal: the build stops before any document is resolved.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("content type `{type_id}`: invalid YAML")]
    Parse {
        type_id: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("content type `{type_id}`: invalid `{field}`")]
    Field {
        type_id: String,
        field: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("content type `{type_id}`: `{field}` has unknown property type `{found}`")]
    UnknownPropertyType {
        type_id: String,
        field: String,
        found: String,
    },

    #[error("content type `{type_id}`: default of `{field}` is not a valid {expected}")]
    InvalidDefault {
        type_id: String,
        field: String,
        expected: &'static str,
    },

    #[error("content type `{type_id}`: `{field}` has malformed foreign key `{expression}`: {reason}")]
    InvalidForeignKey {
        type_id: String,
        field: String,
        expression: String,
        reason: String,
    },

    #[error(
        "content type `{type_id}`: relation `{relation}` is declared as a {found} property, identifiers must be strings"
    )]
    RelationPropertyConflict {
        type_id: String,
        relation: String,
        found: &'static str,
    },
}
