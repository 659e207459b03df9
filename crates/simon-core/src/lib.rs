//! simon-core: shared types for the Simon capacity-planning simulator.
//!
//! Holds the cluster object model (nodes, pods, workload specs and the
//! opaque kinds the decision engine may consult), resource quantities and
//! their aggregation, manifest documents, the structural-validation
//! predicate, and `simon.toml` configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod manifest;
pub mod objects;
pub mod quantity;
pub mod resources;
pub mod validation;

pub use config::SimonConfig;
pub use error::{CoreError, CoreResult};
pub use manifest::{ManifestDocument, ManifestSet};
pub use objects::*;
pub use quantity::Quantity;
pub use validation::{DefaultValidator, ObjectValidator};
