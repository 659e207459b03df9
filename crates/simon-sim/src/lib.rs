//! simon-sim: the simulation orchestrator.
//!
//! - [`source`]: list-only cluster sources (snapshot files, empty cluster)
//! - [`sync`]: copies a source into the synthetic store, all-or-nothing
//! - [`run`]: the per-run state machine and its completion detector
//! - [`controller`]: the [`Simulator`], which wires store, engine and
//!   detector together and owns the run lifecycle

pub mod controller;
pub mod error;
pub mod run;
pub mod source;
pub mod sync;

pub use controller::{RunOutcome, Simulator};
pub use error::{SimError, SimResult, SourceError};
pub use run::{RunState, SimulationRun, StopSignal};
pub use source::{ClusterSnapshot, ClusterSource, EmptySource, SnapshotSource};
pub use sync::{SyncSummary, sync_cluster};
