//! Markdown to HTML, with heading anchors and a table of contents.

use crate::{content::Value, map, utils::slug::slugify};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Average reading speed used for `readingTime`.
const WORDS_PER_MINUTE: usize = 238;

/// One heading in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    /// Anchor id of the heading, without `#`.
    pub fragment: String,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn to_value(&self) -> Value {
        Value::Map(map! {
            "level" => i64::from(self.level),
            "text" => self.text.as_str(),
            "fragment" => self.fragment.as_str(),
            "children" => toc_value(&self.children),
        })
    }
}

pub fn toc_value(entries: &[TocEntry]) -> Value {
    Value::List(entries.iter().map(TocEntry::to_value).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Markdown rendering capability. Called from rayon workers.
pub trait MarkdownRenderer: Sync {
    fn render(&self, markdown: &str) -> RenderedMarkdown;
}

// ============================================================================
// CommonMark
// ============================================================================

/// `pulldown-cmark` renderer with GitHub-style extensions.
///
/// Headings get an `id` (explicit `{#id}` attributes win), duplicates are
/// suffixed `-1`, `-2`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl CommonMark {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
    }
}

impl MarkdownRenderer for CommonMark {
    fn render(&self, markdown: &str) -> RenderedMarkdown {
        let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, Self::options()).collect();
        let mut headings = Vec::new();
        let mut seen: FxHashMap<String, usize> = FxHashMap::default();

        let mut i = 0;
        while i < events.len() {
            let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
                i += 1;
                continue;
            };
            let level = *level as u8;
            let explicit = id.as_ref().map(|id| id.to_string());

            let mut text = String::new();
            let mut end = i + 1;
            while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
                if let Event::Text(t) | Event::Code(t) = &events[end] {
                    text.push_str(t);
                }
                end += 1;
            }

            let base = explicit.unwrap_or_else(|| slugify(&text));
            let fragment = unique_fragment(&mut seen, base);
            if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
                *id = Some(CowStr::from(fragment.clone()));
            }

            headings.push((level, text.trim().to_owned(), fragment));
            i = end + 1;
        }

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());

        RenderedMarkdown {
            html: output,
            toc: build_toc(headings),
        }
    }
}

fn unique_fragment(seen: &mut FxHashMap<String, usize>, base: String) -> String {
    let base = if base.is_empty() { "section".to_owned() } else { base };
    let count = seen.entry(base.clone()).or_insert(0);
    let fragment = match *count {
        0 => base,
        n => format!("{base}-{n}"),
    };
    *count += 1;
    fragment
}

// ============================================================================
// Table of contents
// ============================================================================

/// Nest a flat heading list: each heading becomes a child of the closest
/// preceding heading with a lower level.
pub fn build_toc(headings: Vec<(u8, String, String)>) -> Vec<TocEntry> {
    let mut toc = Vec::new();
    for (level, text, fragment) in headings {
        insert(
            &mut toc,
            TocEntry {
                level,
                text,
                fragment,
                children: Vec::new(),
            },
        );
    }
    toc
}

fn insert(entries: &mut Vec<TocEntry>, entry: TocEntry) {
    match entries.last_mut() {
        Some(last) if last.level < entry.level => insert(&mut last.children, entry),
        _ => entries.push(entry),
    }
}

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])([^>]*)>(.*?)</h[1-6]\s*>").unwrap());
static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid\s*=\s*["']([^"']*)["']"#).unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Table of contents of already rendered HTML.
///
/// Used when a transform pipeline produces HTML instead of markdown. Headings
/// without an `id` get the slug of their text.
pub fn html_toc(html: &str) -> Vec<TocEntry> {
    let mut seen = FxHashMap::default();
    let headings = HEADING
        .captures_iter(html)
        .filter_map(|caps| {
            let level = caps[1].parse::<u8>().ok()?;
            let text = TAG.replace_all(&caps[3], "").trim().to_owned();
            let fragment = match ID_ATTR.captures(&caps[2]) {
                Some(id) => id[1].to_owned(),
                None => unique_fragment(&mut seen, slugify(&text)),
            };
            Some((level, text, fragment))
        })
        .collect();
    build_toc(headings)
}

/// Estimated minutes to read `text`, rounded up. Markup tags are not counted.
pub fn reading_time(text: &str) -> usize {
    let words = TAG.replace_all(text, " ").split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE)
}
