//! URL slugification.
//!
//! Converts content paths and heading text to URL-safe identifiers.

use std::path::{Component, Path};

// ============================================================================
// Slugification
// ============================================================================

/// Lowercase ASCII slug: transliterated, runs of non-alphanumerics become `-`.
///
/// `"Héllo, World!"` → `"hello-world"`
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slugify each component of a relative path and join them with `/`.
///
/// `posts/My First Post` → `posts/my-first-post`. Empty components vanish,
/// so the content root maps to `""`.
pub fn slugify_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(slugify(&part.to_string_lossy())),
            _ => None,
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Héllo Wörld"), "hello-world");
        assert_eq!(slugify("你好"), "ni-hao");
    }

    #[test]
    fn test_slugify_keeps_digits() {
        assert_eq!(slugify("Rust 2024 Edition"), "rust-2024-edition");
    }

    #[test]
    fn test_slugify_only_symbols() {
        assert_eq!(slugify("?!#"), "");
    }

    #[test]
    fn test_slugify_path() {
        assert_eq!(slugify_path(Path::new("posts/My First Post")), "posts/my-first-post");
        assert_eq!(slugify_path(Path::new("")), "");
        assert_eq!(slugify_path(Path::new("./about")), "about");
    }
}
