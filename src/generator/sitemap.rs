//! Sitemap generation.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/posts/hello/</loc>
//!     <lastmod>2025-01-01</lastmod>
//!   </url>
//! </urlset>
//! ```

use super::page_date;
use crate::render::RenderJob;
use anyhow::Result;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{io::Cursor, path::Path};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const INDEX_FILE: &str = "index.html";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Sitemap of every rendered `index.html` page.
///
/// Other outputs (`404.html`, custom feeds) are not pages a crawler should
/// list.
pub fn build_sitemap(base_url: &str, jobs: &[&RenderJob]) -> Result<String> {
    let mut entries: Vec<(String, Option<String>)> = jobs
        .iter()
        .filter_map(|job| {
            let loc = page_url(base_url, &job.destination)?;
            let lastmod = page_date(job, "lastUpdate").map(|date| date.format("%Y-%m-%d").to_string());
            Some((loc, lastmod))
        })
        .collect();
    // a dated entry wins over an undated copy of the same page
    entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));
    entries.dedup_by(|a, b| a.0 == b.0);

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for (loc, lastmod) in &entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", loc)?;
        if let Some(lastmod) = lastmod {
            write_text_element(&mut writer, "lastmod", lastmod)?;
        }
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Public URL of an output file, `None` unless it is a directory index.
fn page_url(base_url: &str, destination: &Path) -> Option<String> {
    if destination.file_name()? != INDEX_FILE {
        return None;
    }
    let dir: Vec<String> = destination
        .parent()?
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let base = base_url.trim_end_matches('/');
    if dir.is_empty() {
        Some(format!("{base}/"))
    } else {
        Some(format!("{base}/{}/", dir.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{content::Map, map};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn job(destination: &str, page: Map) -> RenderJob {
        RenderJob {
            template: "default".into(),
            shared: Default::default(),
            context: map! { "page" => page },
            destination: PathBuf::from(destination),
            content_type: "page".into(),
            slug: String::new(),
        }
    }

    #[test]
    fn test_page_url() {
        assert_eq!(page_url("https://k.dev/", Path::new("index.html")).as_deref(), Some("https://k.dev/"));
        assert_eq!(
            page_url("https://k.dev", Path::new("posts/hello/index.html")).as_deref(),
            Some("https://k.dev/posts/hello/")
        );
        assert_eq!(page_url("https://k.dev", Path::new("404.html")), None);
        assert_eq!(page_url("https://k.dev", Path::new("feed.xml")), None);
    }

    #[test]
    fn test_empty_sitemap() {
        let xml = build_sitemap("https://k.dev", &[]).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}""#)));
        assert!(!xml.contains("<url>"));
    }

    #[test]
    fn test_entries() {
        let updated = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let home = job("index.html", map! { "lastUpdate" => updated });
        let post = job("posts/a&b/index.html", Map::new());
        let missing = job("404.html", map! { "lastUpdate" => updated });
        let root_copy = job("index.html", Map::new());

        let xml = build_sitemap("https://k.dev", &[&home, &post, &missing, &root_copy]).unwrap();

        assert_eq!(xml.matches("<url>").count(), 2);
        assert!(xml.contains("<loc>https://k.dev/</loc>"));
        assert!(xml.contains("<lastmod>2025-01-01</lastmod>"));
        assert!(xml.contains("<loc>https://k.dev/posts/a&amp;b/</loc>"));
        assert!(!xml.contains("404"));
    }
}
