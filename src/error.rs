//! Error types for the nameplate library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the nameplate library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source template missing
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// File not found (font files and inspected documents)
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Expected label text absent from a template page.
    ///
    /// Generation only logs this; it is never returned from `generate_*`.
    #[error("Anchor text {label:?} not found on page {page}")]
    AnchorNotFound { label: String, page: usize },

    /// Drawing onto a page failed
    #[error("Rendering failed on page {page}: {reason}")]
    Render { page: usize, reason: String },

    /// Writing the generated document failed
    #[error("Could not write {}: {reason}", .path.display())]
    OutputWrite { path: PathBuf, reason: String },

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Bot started without a token
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Telegram answered with ok=false
    #[error("Telegram API error: {0}")]
    Telegram(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Attach a page number to a failure that happened while drawing.
    pub(crate) fn render(page: usize, err: Error) -> Error {
        match err {
            Error::Render { .. } => err,
            other => Error::Render {
                page,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_wraps_once() {
        let inner = Error::General("no Contents".to_string());
        let wrapped = Error::render(3, inner);
        assert_eq!(wrapped.to_string(), "Rendering failed on page 3: no Contents");

        let rewrapped = Error::render(7, wrapped);
        assert!(matches!(rewrapped, Error::Render { page: 3, .. }));
    }
}
