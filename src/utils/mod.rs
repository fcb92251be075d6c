//! Small helpers shared across the build.

pub mod date;
pub mod minify;
pub mod slug;
