//! simon-report: read-only views over the final synthetic cluster.
//!
//! - [`capacity`]: per-node and per-pod resource usage, and the nodes each
//!   workload landed on
//! - [`table`]: the two-table text report
//! - [`plan`]: the placement plan file

pub mod capacity;
pub mod error;
pub mod plan;
pub mod table;

pub use capacity::{CapacityReport, NodeUsage, PodUsage, WorkloadPlacements, adjust_nodes_order};
pub use error::{ReportError, ReportResult};
pub use plan::{PlacementPlan, read_plan, write_plan};
pub use table::format_report;
