//! Error types for the combat core.
//!
//! Routine simulation outcomes (no path, a target that died, an exhausted
//! search budget) are not errors; they surface as `None` or a dropped
//! target. These variants cover misuse at the crate boundary.

use thiserror::Error;

use crate::unit::UnitId;

/// Result type alias using [`SkirmishError`].
pub type Result<T> = std::result::Result<T, SkirmishError>;

/// Top-level error type for the combat core.
#[derive(Debug, Error)]
pub enum SkirmishError {
    /// Map description is inconsistent.
    #[error("Invalid map: {0}")]
    InvalidMap(String),

    /// Unit handle does not resolve to a live unit.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Role name not present in the role table.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Configuration text failed to parse or validate.
    #[error("Failed to parse config '{source_name}': {message}")]
    ConfigParse {
        /// Name of the config source (file path or label).
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Invalid battle state for the requested operation.
    #[error("Invalid battle state: {0}")]
    InvalidState(String),

    /// Battle snapshot could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
