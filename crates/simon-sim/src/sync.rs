//! Snapshot synchronizer.
//!
//! Copies a real cluster's objects into the synthetic store, kind by kind,
//! in a fixed order. The first failure aborts the whole sync.

use std::collections::BTreeMap;

use tracing::{debug, info};

use simon_core::ObjectKind;
use simon_state::ClusterStore;

use crate::error::{SimError, SimResult};
use crate::source::ClusterSource;

/// Opaque kinds, in copy order. Nodes and pods, when included, go first.
pub const PASSTHROUGH_KINDS: [ObjectKind; 9] = [
    ObjectKind::PodDisruptionBudget,
    ObjectKind::Service,
    ObjectKind::StorageClass,
    ObjectKind::PersistentVolumeClaim,
    ObjectKind::ReplicationController,
    ObjectKind::Deployment,
    ObjectKind::ReplicaSet,
    ObjectKind::StatefulSet,
    ObjectKind::DaemonSet,
];

/// Objects copied per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub copied: BTreeMap<ObjectKind, usize>,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.copied.values().sum()
    }
}

fn sync_error(kind: ObjectKind, reason: impl ToString) -> SimError {
    SimError::Sync {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

/// Copy `source` into `store`.
///
/// Every object is deserialized into an owned value and re-serialized by
/// the store, so nothing the simulation does can reach back to the source.
pub fn sync_cluster(
    source: &dyn ClusterSource,
    store: &ClusterStore,
    include_pods_and_nodes: bool,
) -> SimResult<SyncSummary> {
    let mut summary = SyncSummary::default();

    if include_pods_and_nodes {
        let nodes = source
            .list_nodes()
            .map_err(|e| sync_error(ObjectKind::Node, e))?;
        for node in &nodes {
            store
                .create_node(node)
                .map_err(|e| sync_error(ObjectKind::Node, e))?;
        }
        summary.copied.insert(ObjectKind::Node, nodes.len());

        let pods = source
            .list_pods()
            .map_err(|e| sync_error(ObjectKind::Pod, e))?;
        for pod in &pods {
            store
                .create_pod(pod)
                .map_err(|e| sync_error(ObjectKind::Pod, e))?;
        }
        summary.copied.insert(ObjectKind::Pod, pods.len());
    }

    for kind in PASSTHROUGH_KINDS {
        let objects = source.list_objects(kind).map_err(|e| sync_error(kind, e))?;
        for obj in &objects {
            store
                .create_raw(kind, obj)
                .map_err(|e| sync_error(kind, e))?;
        }
        debug!(%kind, count = objects.len(), "kind synced");
        summary.copied.insert(kind, objects.len());
    }

    info!(
        objects = summary.total(),
        include_pods_and_nodes, "cluster snapshot synced"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::SourceError;
    use crate::source::{ClusterSnapshot, SnapshotSource, SourceResult};
    use simon_core::{Node, ObjectMeta, Pod, RawObject};

    fn test_snapshot() -> ClusterSnapshot {
        let mut node = Node::default();
        node.metadata.name = "node-a".into();
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("default", "running");
        pod.spec.node_name = Some("node-a".into());
        ClusterSnapshot {
            nodes: vec![node],
            pods: vec![pod],
            services: vec![RawObject {
                metadata: ObjectMeta::named("prod", "api"),
                ..RawObject::default()
            }],
            daemon_sets: vec![RawObject {
                metadata: ObjectMeta::named("kube-system", "agent"),
                ..RawObject::default()
            }],
            ..ClusterSnapshot::default()
        }
    }

    fn test_store() -> ClusterStore {
        ClusterStore::open_in_memory("default-scheduler").unwrap()
    }

    #[test]
    fn copies_everything_when_included() {
        let store = test_store();
        let summary = sync_cluster(&SnapshotSource::new(test_snapshot()), &store, true).unwrap();

        assert_eq!(summary.copied[&ObjectKind::Node], 1);
        assert_eq!(summary.copied[&ObjectKind::Pod], 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(store.list_nodes().unwrap().len(), 1);
        assert_eq!(store.list_raw(ObjectKind::Service).unwrap().len(), 1);
        // Passthrough daemon sets stay readable as typed objects.
        assert_eq!(store.list_daemon_sets().unwrap()[0].metadata.name, "agent");
    }

    #[test]
    fn skips_nodes_and_pods_when_excluded() {
        let store = test_store();
        let summary = sync_cluster(&SnapshotSource::new(test_snapshot()), &store, false).unwrap();
        assert!(!summary.copied.contains_key(&ObjectKind::Node));
        assert_eq!(store.count(ObjectKind::Node).unwrap(), 0);
        assert_eq!(store.count(ObjectKind::Pod).unwrap(), 0);
        assert_eq!(store.count(ObjectKind::DaemonSet).unwrap(), 1);
    }

    /// Fails on one kind and records the order kinds were asked for.
    struct FailingSource {
        fail_on: ObjectKind,
        asked: Mutex<Vec<ObjectKind>>,
    }

    impl ClusterSource for FailingSource {
        fn list_nodes(&self) -> SourceResult<Vec<Node>> {
            self.asked.lock().unwrap().push(ObjectKind::Node);
            Ok(Vec::new())
        }

        fn list_pods(&self) -> SourceResult<Vec<Pod>> {
            self.asked.lock().unwrap().push(ObjectKind::Pod);
            Ok(Vec::new())
        }

        fn list_objects(&self, kind: ObjectKind) -> SourceResult<Vec<RawObject>> {
            self.asked.lock().unwrap().push(kind);
            if kind == self.fail_on {
                return Err(SourceError::Decode("forbidden".into()));
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn first_failure_aborts_remaining_kinds() {
        let source = FailingSource {
            fail_on: ObjectKind::StorageClass,
            asked: Mutex::new(Vec::new()),
        };
        let err = sync_cluster(&source, &test_store(), true).unwrap_err();
        assert!(matches!(err, SimError::Sync { ref kind, .. } if kind == "StorageClass"));
        assert!(err.to_string().contains("forbidden"));

        let asked = source.asked.lock().unwrap().clone();
        assert_eq!(
            asked,
            [
                ObjectKind::Node,
                ObjectKind::Pod,
                ObjectKind::PodDisruptionBudget,
                ObjectKind::Service,
                ObjectKind::StorageClass,
            ]
        );
    }

    #[test]
    fn duplicate_objects_fail_the_sync() {
        let store = test_store();
        let mut snapshot = test_snapshot();
        snapshot.nodes.push(snapshot.nodes[0].clone());
        let err = sync_cluster(&SnapshotSource::new(snapshot), &store, true).unwrap_err();
        assert!(matches!(err, SimError::Sync { ref kind, .. } if kind == "Node"));
    }
}
