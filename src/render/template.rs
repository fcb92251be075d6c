//! Template rendering with `minijinja`.
//!
//! Template ids are dotted paths relative to the templates directory:
//! `blog.post` loads `templates/blog/post.html`. Ids ending in `.html` are
//! used as plain paths, which keeps `{% include "partials/nav.html" %}` working.

use crate::{content::Map, utils::date::parse_date};
use minijinja::{AutoEscape, Environment, ErrorKind};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("failed to render template `{template}`")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Template rendering capability. Called from rayon workers.
pub trait TemplateRenderer: Sync {
    fn render(&self, template: &str, context: &Map) -> Result<Vec<u8>, TemplateError>;
}

/// Map a template id to its file.
pub fn template_path(dir: &Path, id: &str) -> PathBuf {
    if id.ends_with(".html") {
        return dir.join(id);
    }
    let mut path = dir.join(id.replace('.', "/"));
    path.set_extension("html");
    path
}

/// Templates backed by a directory.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// `date_format` is the default format of the `date` filter.
    pub fn new(dir: &Path, date_format: &str) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let dir = dir.to_path_buf();
        env.set_loader(move |id| match fs::read_to_string(template_path(&dir, id)) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(
                minijinja::Error::new(ErrorKind::InvalidOperation, format!("cannot read template `{id}`"))
                    .with_source(err),
            ),
        });

        let default_format = date_format.to_owned();
        env.add_filter("date", move |value: String, format: Option<String>| {
            let date = parse_date(&value, None).ok_or_else(|| {
                minijinja::Error::new(ErrorKind::InvalidOperation, format!("`{value}` is not a date"))
            })?;
            // formatted dates are final text; autoescape would mangle `/`
            Ok::<_, minijinja::Error>(minijinja::Value::from_safe_string(
                date.format(format.as_deref().unwrap_or(&default_format))
                    .to_string(),
            ))
        });

        Self { env }
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, template: &str, context: &Map) -> Result<Vec<u8>, TemplateError> {
        let compiled = self.env.get_template(template).map_err(|source| {
            if source.kind() == ErrorKind::TemplateNotFound {
                TemplateError::NotFound(template.to_owned())
            } else {
                TemplateError::Render {
                    template: template.to_owned(),
                    source,
                }
            }
        })?;

        compiled
            .render(context)
            .map(String::into_bytes)
            .map_err(|source| TemplateError::Render {
                template: template.to_owned(),
                source,
            })
    }
}
