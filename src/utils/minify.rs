//! Output minification, chosen by file extension.

use std::{borrow::Cow, path::Path};

/// How an output file may be minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Html,
    Xml,
    /// Written as rendered.
    Verbatim,
}

impl OutputKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("html" | "htm") => Self::Html,
            Some("xml" | "rss" | "atom") => Self::Xml,
            _ => Self::Verbatim,
        }
    }
}

/// Minified `content`, or `content` itself when disabled or not applicable.
pub fn minify(kind: OutputKind, content: &[u8], enabled: bool) -> Cow<'_, [u8]> {
    match (enabled, kind) {
        (true, OutputKind::Html) => Cow::Owned(minify_html(content)),
        (true, OutputKind::Xml) => Cow::Owned(minify_xml(content)),
        _ => Cow::Borrowed(content),
    }
}

fn minify_html(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.minify_css = true;
    cfg.minify_js = true;
    minify_html::minify(html, &cfg)
}

/// Drop indentation and blank lines. Non UTF-8 input is left untouched.
fn minify_xml(xml: &[u8]) -> Vec<u8> {
    let Ok(text) = std::str::from_utf8(xml) else {
        return xml.to_vec();
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<String>()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(OutputKind::from_path(Path::new("a/index.html")), OutputKind::Html);
        assert_eq!(OutputKind::from_path(Path::new("sitemap.xml")), OutputKind::Xml);
        assert_eq!(OutputKind::from_path(Path::new("feed.json")), OutputKind::Verbatim);
        assert_eq!(OutputKind::from_path(Path::new("CNAME")), OutputKind::Verbatim);
    }

    #[test]
    fn test_html_minified() {
        let html = b"<html>\n  <body>\n    <p>Hello World</p>\n  </body>\n</html>";
        let result = minify(OutputKind::Html, html, true);
        let text = String::from_utf8_lossy(&result);

        assert!(result.len() < html.len());
        assert!(text.contains("<p>Hello World</p>"));
    }

    #[test]
    fn test_disabled_is_borrowed() {
        let html = b"<p>\n  x\n</p>";
        assert!(matches!(minify(OutputKind::Html, html, false), Cow::Borrowed(_)));
        assert!(matches!(minify(OutputKind::Verbatim, html, true), Cow::Borrowed(_)));
    }

    #[test]
    fn test_xml_lines_joined() {
        let xml = b"<?xml version=\"1.0\"?>\n<urlset>\n\n  <url>\n    <loc>https://k.dev/</loc>\n  </url>\n</urlset>";
        let result = minify(OutputKind::Xml, xml, true);
        assert_eq!(
            &*result,
            b"<?xml version=\"1.0\"?><urlset><url><loc>https://k.dev/</loc></url></urlset>"
        );
    }
}
