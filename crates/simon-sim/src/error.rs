//! Simulation error types.

use simon_state::StateError;
use simon_workload::WorkloadError;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    /// A kind could not be listed from the source or copied into the
    /// store. Synchronization is all-or-nothing.
    #[error("failed to sync {kind}: {reason}")]
    Sync { kind: String, reason: String },

    /// Materialization or provisioning produced an invalid object, or
    /// could not write it.
    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Errors from a cluster source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),
}
