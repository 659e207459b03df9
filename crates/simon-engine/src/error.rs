//! Decision-engine error types.

use simon_state::StateError;
use thiserror::Error;

/// The bind interceptor could not record a decision.
///
/// Local and non-fatal: the engine decides whether to retry.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("unable to bind: pod {0} not found")]
    PodNotFound(String),

    #[error("unable to bind {pod}: {source}")]
    State {
        pod: String,
        #[source]
        source: StateError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

pub type EngineResult<T> = Result<T, EngineError>;
