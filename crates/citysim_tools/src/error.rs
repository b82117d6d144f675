//! Error types for the tools.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file or directory could not be read or written.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The simulation rejected the input.
    #[error(transparent)]
    Sim(#[from] citysim_core::error::SimError),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encoding or decoding failed.
    #[error("RON error: {0}")]
    Ron(String),

    /// Output path has an extension we cannot write.
    #[error("Unsupported output format for '{0}' (expected .json or .ron)")]
    UnsupportedFormat(PathBuf),
}

impl ToolError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
