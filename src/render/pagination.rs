//! Splitting ordered lists into pages.

use crate::{
    content::{Map, Value},
    context::permalink,
    map,
};

/// Page size when a pagination query sets no (or a zero) limit.
pub const DEFAULT_PAGE_SIZE: usize = 10;

const NUMBER: &str = "{{number}}";
const TOTAL: &str = "{{total}}";

/// Split `items` into pages of `limit` elements.
///
/// An empty list still yields one empty page, so the list page exists.
pub fn chunk<T>(items: &[T], limit: Option<usize>) -> Vec<&[T]> {
    let size = match limit {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(size) => size,
    };
    if items.is_empty() {
        return vec![&items[..0]];
    }
    items.chunks(size).collect()
}

/// Substitute `{{number}}` and `{{total}}` in a slug template.
pub fn page_slug(template: &str, number: usize, total: usize) -> String {
    template
        .replace(NUMBER, &number.to_string())
        .replace(TOTAL, &total.to_string())
        .trim_matches('/')
        .to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationLink {
    /// 1-based.
    pub number: usize,
    pub total: usize,
    pub slug: String,
    pub permalink: String,
    pub is_current: bool,
}

impl PaginationLink {
    pub fn to_value(&self) -> Value {
        Value::Map(map! {
            "number" => self.number,
            "total" => self.total,
            "slug" => self.slug.as_str(),
            "permalink" => self.permalink.as_str(),
            "isCurrent" => self.is_current,
        })
    }
}

/// Links to every page, `current` (1-based) marked.
pub fn links(total: usize, slug_template: &str, base_url: &str, current: usize) -> Vec<PaginationLink> {
    (1..=total)
        .map(|number| {
            let slug = page_slug(slug_template, number, total);
            PaginationLink {
                number,
                total,
                permalink: permalink(base_url, &slug),
                slug,
                is_current: number == current,
            }
        })
        .collect()
}

/// The `pagination` context of one page.
pub fn pagination_context(links: &[PaginationLink], items: Value, current: usize) -> Map {
    map! {
        "links" => links.iter().map(PaginationLink::to_value).collect::<Vec<_>>(),
        "items" => items,
        "current" => current,
        "total" => links.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes() {
        let items: Vec<usize> = (0..25).collect();
        let sizes: Vec<usize> = chunk(&items, Some(10)).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, [10, 10, 5]);
    }

    #[test]
    fn test_chunk_default_limit() {
        let items: Vec<usize> = (0..11).collect();
        assert_eq!(chunk(&items, None).len(), 2);
        assert_eq!(chunk(&items, Some(0)).len(), 2);
    }

    #[test]
    fn test_chunk_empty() {
        let items: Vec<usize> = Vec::new();
        let pages = chunk(&items, Some(3));
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_page_slug() {
        assert_eq!(page_slug("blog/page/{{number}}", 2, 5), "blog/page/2");
        assert_eq!(page_slug("/blog/{{number}}-of-{{total}}/", 1, 3), "blog/1-of-3");
    }

    #[test]
    fn test_links_current() {
        let links = links(3, "blog/{{number}}", "https://k.dev", 2);
        assert_eq!(links.len(), 3);
        assert_eq!(links.iter().filter(|l| l.is_current).count(), 1);
        assert!(links[1].is_current);
        assert_eq!(links[2].permalink, "https://k.dev/blog/3/");

        let value = links[0].to_value();
        assert_eq!(value.as_map().unwrap()["isCurrent"], Value::Bool(false));
    }

    #[test]
    fn test_pagination_context() {
        let links = links(2, "p/{{number}}", "", 1);
        let context = pagination_context(&links, Value::List(Vec::new()), 1);
        assert_eq!(context["current"], Value::Int(1));
        assert_eq!(context["total"], Value::Int(2));
        assert_eq!(context["links"].as_list().unwrap().len(), 2);
    }
}
