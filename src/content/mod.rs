//! Documents, their values, the store and queries over it.

pub mod document;
pub mod query;
pub mod store;
pub mod value;

pub use document::{Document, RawDocument};
pub use store::{DocumentStore, StoreError};
pub use value::{Map, Value, merge, merged};
