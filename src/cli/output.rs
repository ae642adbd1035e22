//! Output formatting for CLI results.

use crate::error::Error;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

impl OutputFormat {
    /// Parses a format name, defaulting to text for unknown values.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats an error for the selected output format.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => serde_json::json!({
            "error": error.to_string(),
        })
        .to_string(),
    }
}

/// Renders a serializable value as the selected format; `text_fn` builds
/// the human rendition.
pub fn render<T: serde::Serialize>(
    value: &T,
    format: OutputFormat,
    text_fn: impl FnOnce(&T) -> String,
) -> String {
    match format {
        OutputFormat::Text => text_fn(value),
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
    }
}
