//! Bundle error types

use std::path::PathBuf;
use thiserror::Error;

/// Why the bundle artifact could not be used as-is. Never leaves the loader:
/// every variant is recovered by substituting the fallback bundle.
#[derive(Error, Debug)]
pub enum BundleLoadError {
    #[error("Failed to read server bundle {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Server bundle is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Server bundle must be a JSON object")]
    NotAnObject,

    #[error("Cannot resolve module '{specifier}': {reason}")]
    Module { specifier: String, reason: String },
}

/// Failure while rendering a request through the bundle.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render failed for {url}: {cause:#}")]
    Module { url: String, cause: anyhow::Error },

    #[error("Render panicked for {url}: {message}")]
    Panicked { url: String, message: String },

    #[error("Render for {url} was cancelled")]
    Cancelled { url: String },

    #[error("Failed to read request body for {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    /// One-line description including the cause chain
    pub fn message(&self) -> String {
        match self {
            RenderError::Module { cause, .. } => format!("{:#}", cause),
            RenderError::Panicked { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Multi-line diagnostic: the cause chain, plus a backtrace when one
    /// was captured.
    pub fn stack(&self) -> String {
        match self {
            RenderError::Module { cause, .. } => format!("{:?}", cause),
            RenderError::Panicked { message, .. } => format!("panicked: {}", message),
            RenderError::Body { source, .. } => format!("{:?}", source),
            RenderError::Cancelled { .. } => "render task was cancelled".to_string(),
        }
    }
}
