//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn url() -> Option<String> {
        None
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn language() -> String {
        "en-US".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn types() -> PathBuf {
        "types".into()
    }

    pub fn overrides() -> PathBuf {
        "overrides".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn date_format() -> String {
        "%Y-%m-%d".into()
    }

    pub mod rss {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "rss.xml".into()
        }
    }

    pub mod sitemap {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "sitemap.xml".into()
        }
    }
}

// ============================================================================
// [contents] Section Defaults
// ============================================================================

pub mod contents {
    pub fn home() -> String {
        "home".into()
    }

    pub fn not_found() -> String {
        "404".into()
    }
}
