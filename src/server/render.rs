//! HTML rendering of the cached snapshot
//!
//! Templates are plain HTML files with `{{ field }}` placeholders, where
//! `field` is any key of the snapshot's JSON form (`mko_name`, `mko_date`,
//! `city`, ...). Substituted values are HTML-escaped.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::data::CachedSnapshot;

/// Errors that can occur while rendering the page
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template file could not be read
    #[error("failed to load template {}: {source}", path.display())]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `{{` without a matching `}}`
    #[error("unterminated placeholder at byte {offset}")]
    UnterminatedPlaceholder { offset: usize },

    /// A placeholder naming a field the snapshot does not have
    #[error("unknown placeholder '{0}'")]
    UnknownPlaceholder(String),

    /// The snapshot could not be turned into template values
    #[error("failed to prepare template values: {0}")]
    Values(#[from] serde_json::Error),
}

impl RenderError {
    /// Whether the failure happened while loading rather than rendering
    pub fn is_load_error(&self) -> bool {
        matches!(self, RenderError::TemplateLoad { .. })
    }
}

/// Turns a snapshot into a document
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &CachedSnapshot) -> Result<String, RenderError>;
}

/// Renders a template file from disk
///
/// The file is read on every call so edits show up without a restart.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    path: PathBuf,
}

impl TemplateRenderer {
    /// Creates a renderer for the template at `path`; the file is not read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the template file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, snapshot: &CachedSnapshot) -> Result<String, RenderError> {
        let template = fs::read_to_string(&self.path).map_err(|source| RenderError::TemplateLoad {
            path: self.path.clone(),
            source,
        })?;
        render_str(&template, snapshot)
    }
}

/// Substitutes every placeholder in `template` with a snapshot field
pub fn render_str(template: &str, snapshot: &CachedSnapshot) -> Result<String, RenderError> {
    let values = serde_json::to_value(snapshot)?;
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut consumed = 0;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(RenderError::UnterminatedPlaceholder {
                offset: consumed + start,
            })?;

        let key = after_open[..end].trim();
        match values.get(key) {
            Some(Value::String(value)) => push_escaped(&mut output, value),
            Some(other) => push_escaped(&mut output, &other.to_string()),
            None => return Err(RenderError::UnknownPlaceholder(key.to_string())),
        }

        let advance = start + 2 + end + 2;
        consumed += advance;
        rest = &rest[advance..];
    }
    output.push_str(rest);

    Ok(output)
}

fn push_escaped(output: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&#34;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}
