//! Error types for entrenar-pipeline
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Empty input and missing-model conditions are deliberately NOT errors:
//! they are normal early-exit signals and surface as `Ok(false)` / `Ok(None)`
//! at the call sites.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// entrenar-pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// Schema contract violation: missing column, null value, or type mismatch.
    /// Always fatal to the current pipeline run, never silently coerced.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Declared value constraint violation (value below column minimum)
    #[error("Constraint violation: column '{column}' has values below minimum {minimum}")]
    ConstraintViolation {
        /// Column carrying the violated constraint
        column: String,
        /// Declared minimum value
        minimum: f64,
    },

    /// Invalid schema contract (overlapping feature/target, undeclared constrained column)
    #[error("Invalid schema contract: {0}")]
    InvalidContract(String),

    /// Artifact or contract cannot be read/written
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
