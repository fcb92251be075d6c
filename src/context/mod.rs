//! Rendering contexts: cached content, per-document resolution and
//! site-wide lists.

pub mod cache;
pub mod resolver;
pub mod site;

pub use cache::{ContentContext, ContextCache};
pub use resolver::{RELATION_DEPTH, Resolver, permalink, report_unresolved_references};
pub use site::SiteContext;
