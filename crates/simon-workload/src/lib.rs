//! simon-workload: turns workload specs and node templates into the
//! concrete pods and nodes injected into a simulation.
//!
//! The [`Materializer`] expands Deployments, StatefulSets, DaemonSets and
//! bare pods into normalized, validated pods. The [`FakeNodeProvisioner`]
//! fabricates hypothetical nodes from a template, together with the daemon
//! pods each node would automatically acquire.

pub mod error;
pub mod materializer;
pub mod provisioner;

pub use error::{WorkloadError, WorkloadResult};
pub use materializer::Materializer;
pub use provisioner::{FakeNodeProvisioner, ProvisionedNodes};
