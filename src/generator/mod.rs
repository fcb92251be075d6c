//! Site-level XML outputs derived from rendered pages.
//!
//! Both generators read the `page` context of [`RenderJob`]s that rendered
//! successfully, so a page that failed to render is never advertised.

pub mod rss;
pub mod sitemap;

use crate::{
    content::{Map, Value},
    render::RenderJob,
};
use chrono::{DateTime, Utc};

fn page(job: &RenderJob) -> Option<&Map> {
    job.context.get("page").and_then(Value::as_map)
}

fn page_text(job: &RenderJob, key: &str) -> Option<String> {
    page(job)?.get(key).and_then(Value::to_plain_string)
}

fn page_date(job: &RenderJob, key: &str) -> Option<DateTime<Utc>> {
    page(job)?.get(key).and_then(Value::as_date)
}
