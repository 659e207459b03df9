//! Error types for workload materialization and node provisioning.

use simon_core::CoreError;
use simon_state::StateError;
use thiserror::Error;

pub type WorkloadResult<T> = Result<T, WorkloadError>;

#[derive(Debug, Error)]
pub enum WorkloadError {
    /// A produced object is malformed. Fatal: the run must not start.
    #[error("configuration error: {0}")]
    Configuration(#[from] CoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}
