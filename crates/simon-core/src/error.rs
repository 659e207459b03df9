//! Error types for the Simon core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing or validating cluster objects.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid quantity {0:?}")]
    Quantity(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A materialized or synthesized object failed structural validation.
    #[error("invalid {kind} {name}: {}", reasons.join(", "))]
    Invalid {
        kind: &'static str,
        name: String,
        reasons: Vec<String>,
    },
}
