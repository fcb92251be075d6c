//! RSS feed of the content types flagged with `rss: true`.

use super::{page_date, page_text};
use crate::{
    config::SiteConfig,
    render::RenderJob,
    schema::Registry,
    utils::date::to_rfc2822,
};
use anyhow::{Result, anyhow};
use regex::Regex;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};
use std::sync::LazyLock;

/// Feed XML for every dated document page of an RSS-enabled type, newest first.
pub fn build_rss(config: &SiteConfig, registry: &Registry, jobs: &[&RenderJob]) -> Result<String> {
    let mut entries: Vec<_> = jobs
        .iter()
        .filter(|job| registry.get(&job.content_type).is_some_and(|ty| ty.rss))
        .filter_map(|job| Some((page_date(job, "publication")?, *job)))
        .collect();
    entries.sort_by(|(a, _), (b, _)| b.cmp(a));

    let items: Vec<rss::Item> = entries
        .into_iter()
        .map(|(date, job)| {
            let link = page_text(job, "permalink");
            ItemBuilder::default()
                .title(page_text(job, "title").unwrap_or_else(|| job.slug.clone()))
                .link(link.clone())
                .guid(link.map(|link| GuidBuilder::default().permalink(true).value(link).build()))
                .description(page_text(job, "description"))
                .pub_date(to_rfc2822(&date))
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(&config.base.title)
        .link(config.base.base_url())
        .description(&config.base.description)
        .language(config.base.language.clone())
        .managing_editor(feed_author(&config.base.author))
        .generator("kestrel".to_owned())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("rss validation failed: {e}"))?;
    Ok(channel.to_string())
}

/// RSS wants `email (Name)`; anything else is left out.
fn feed_author(author: &str) -> Option<String> {
    static RE_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}[ \t]*\([^)]+\)$").unwrap()
    });
    RE_AUTHOR.is_match(author).then(|| author.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{Map, Value},
        map,
        schema::ContentType,
    };
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn job(content_type: &str, slug: &str, page: Map) -> RenderJob {
        RenderJob {
            template: "default".into(),
            shared: Default::default(),
            context: map! { "page" => page },
            destination: PathBuf::from(format!("{slug}/index.html")),
            content_type: content_type.into(),
            slug: slug.into(),
        }
    }

    fn registry() -> Registry {
        Registry::load(
            vec![
                ContentType::from_yaml("rss: true", "post").unwrap(),
                ContentType::from_yaml("id: page", "page").unwrap(),
            ],
            vec![],
        )
        .unwrap()
    }

    fn config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.base.title = "Kestrel".into();
        config.base.description = "Notes".into();
        config.base.url = Some("https://k.dev".into());
        config
    }

    fn post(slug: &str, day: u32) -> RenderJob {
        job(
            "post",
            slug,
            map! {
                "title" => slug,
                "permalink" => format!("https://k.dev/{slug}/"),
                "description" => "summary",
                "publication" => Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            },
        )
    }

    #[test]
    fn test_only_rss_types_newest_first() {
        let old = post("old", 1);
        let new = post("new", 9);
        let about = job("page", "about", map! { "title" => "About", "publication" => Value::Date(Utc::now()) });

        let xml = build_rss(&config(), &registry(), &[&old, &about, &new]).unwrap();
        let channel = rss::Channel::read_from(xml.as_bytes()).unwrap();

        let titles: Vec<_> = channel.items().iter().filter_map(|i| i.title()).collect();
        assert_eq!(titles, ["new", "old"]);
        assert_eq!(channel.items()[0].link(), Some("https://k.dev/new/"));
        assert!(channel.items()[1].pub_date().unwrap().contains("Jan 2024"));
        assert_eq!(channel.title(), "Kestrel");
    }

    #[test]
    fn test_undated_pages_skipped() {
        let list = job("post", "blog", map! { "slug" => "blog" });
        let xml = build_rss(&config(), &registry(), &[&list]).unwrap();
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn test_feed_author() {
        assert_eq!(feed_author("ada@k.dev (Ada)").as_deref(), Some("ada@k.dev (Ada)"));
        assert_eq!(feed_author("Ada"), None);
    }
}
