//! Error types for occurrence generation and exception handling.

use thiserror::Error;

use crate::occurrence::ExceptionId;
use crate::timespan::TimeSpan;

/// Errors that can occur in occurrent operations.
#[derive(Error, Debug)]
pub enum OccurrentError {
    #[error("Invalid timespan: {0}")]
    InvalidSpan(String),

    #[error("Generator '{generator}' already has an exception for {timespan}")]
    AmbiguousException { generator: String, timespan: TimeSpan },

    #[error("Invalid repetition rule: {0}")]
    InvalidRule(String),

    #[error("Occurrence sequence is unbounded; supply a count or an end instant")]
    Unbounded,

    #[error("Generator not found: {0}")]
    GeneratorNotFound(String),

    #[error("Exception not found: {0}")]
    ExceptionNotFound(ExceptionId),

    #[error("Exception {0} already exists")]
    DuplicateException(ExceptionId),

    #[error("Occurrence at {0} matches its generated timing and has nothing to persist")]
    NotExceptional(TimeSpan),

    #[error("Exception {exception} does not belong to generator '{generator}'")]
    ExceptionOwnership {
        exception: ExceptionId,
        generator: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for occurrent operations.
pub type OccurrentResult<T> = Result<T, OccurrentError>;
