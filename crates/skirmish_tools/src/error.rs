//! Error types for the development tools.

use std::path::PathBuf;

use skirmish_core::error::SkirmishError;
use thiserror::Error;

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Scenario text is malformed.
    #[error("Failed to parse scenario '{source_name}': {message}")]
    Scenario {
        /// File path or label.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// The combat core rejected the input.
    #[error(transparent)]
    Core(#[from] SkirmishError),

    /// Event could not be encoded as JSON.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Event output could not be written.
    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

/// Read a whole file, tagging failures with the path.
pub fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}
