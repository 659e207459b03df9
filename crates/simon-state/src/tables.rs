//! redb table definitions for the synthetic cluster store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized objects).

use redb::TableDefinition;
use simon_core::ObjectKind;

type ObjectTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Nodes keyed by `{name}`.
pub const NODES: ObjectTable = TableDefinition::new("nodes");

/// Pods keyed by `{namespace}/{name}`.
pub const PODS: ObjectTable = TableDefinition::new("pods");

pub const POD_DISRUPTION_BUDGETS: ObjectTable = TableDefinition::new("pod_disruption_budgets");
pub const SERVICES: ObjectTable = TableDefinition::new("services");

/// Storage classes keyed by `{name}`.
pub const STORAGE_CLASSES: ObjectTable = TableDefinition::new("storage_classes");

pub const PERSISTENT_VOLUME_CLAIMS: ObjectTable =
    TableDefinition::new("persistent_volume_claims");
pub const REPLICATION_CONTROLLERS: ObjectTable = TableDefinition::new("replication_controllers");
pub const DEPLOYMENTS: ObjectTable = TableDefinition::new("deployments");
pub const REPLICA_SETS: ObjectTable = TableDefinition::new("replica_sets");
pub const STATEFUL_SETS: ObjectTable = TableDefinition::new("stateful_sets");
pub const DAEMON_SETS: ObjectTable = TableDefinition::new("daemon_sets");

/// The table holding objects of `kind`.
pub fn table_for(kind: ObjectKind) -> ObjectTable {
    match kind {
        ObjectKind::Node => NODES,
        ObjectKind::Pod => PODS,
        ObjectKind::PodDisruptionBudget => POD_DISRUPTION_BUDGETS,
        ObjectKind::Service => SERVICES,
        ObjectKind::StorageClass => STORAGE_CLASSES,
        ObjectKind::PersistentVolumeClaim => PERSISTENT_VOLUME_CLAIMS,
        ObjectKind::ReplicationController => REPLICATION_CONTROLLERS,
        ObjectKind::Deployment => DEPLOYMENTS,
        ObjectKind::ReplicaSet => REPLICA_SETS,
        ObjectKind::StatefulSet => STATEFUL_SETS,
        ObjectKind::DaemonSet => DAEMON_SETS,
    }
}
