//! Read-only cluster sources.
//!
//! The simulator never writes to a real cluster. It only lists objects
//! from a [`ClusterSource`] and copies them into its own store.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use simon_core::{Node, ObjectKind, Pod, RawObject};

use crate::error::SourceError;

pub type SourceResult<T> = Result<T, SourceError>;

/// List-only access to a cluster.
pub trait ClusterSource: Send + Sync {
    fn list_nodes(&self) -> SourceResult<Vec<Node>>;

    fn list_pods(&self) -> SourceResult<Vec<Pod>>;

    /// Objects of a kind the simulator passes through without interpreting.
    fn list_objects(&self, kind: ObjectKind) -> SourceResult<Vec<RawObject>>;
}

/// A source with nothing in it, for planning against an empty cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ClusterSource for EmptySource {
    fn list_nodes(&self) -> SourceResult<Vec<Node>> {
        Ok(Vec::new())
    }

    fn list_pods(&self) -> SourceResult<Vec<Pod>> {
        Ok(Vec::new())
    }

    fn list_objects(&self, _kind: ObjectKind) -> SourceResult<Vec<RawObject>> {
        Ok(Vec::new())
    }
}

/// A point-in-time dump of a cluster, one list per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub pod_disruption_budgets: Vec<RawObject>,
    pub services: Vec<RawObject>,
    pub storage_classes: Vec<RawObject>,
    pub persistent_volume_claims: Vec<RawObject>,
    pub replication_controllers: Vec<RawObject>,
    pub deployments: Vec<RawObject>,
    pub replica_sets: Vec<RawObject>,
    pub stateful_sets: Vec<RawObject>,
    pub daemon_sets: Vec<RawObject>,
}

impl ClusterSnapshot {
    fn objects(&self, kind: ObjectKind) -> &[RawObject] {
        match kind {
            ObjectKind::PodDisruptionBudget => &self.pod_disruption_budgets,
            ObjectKind::Service => &self.services,
            ObjectKind::StorageClass => &self.storage_classes,
            ObjectKind::PersistentVolumeClaim => &self.persistent_volume_claims,
            ObjectKind::ReplicationController => &self.replication_controllers,
            ObjectKind::Deployment => &self.deployments,
            ObjectKind::ReplicaSet => &self.replica_sets,
            ObjectKind::StatefulSet => &self.stateful_sets,
            ObjectKind::DaemonSet => &self.daemon_sets,
            ObjectKind::Node | ObjectKind::Pod => &[],
        }
    }
}

/// A cluster source backed by a snapshot file.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    snapshot: ClusterSnapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a `.json` dump, or YAML for any other extension.
    pub fn from_file(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let snapshot = if is_json {
            serde_json::from_str(&content).map_err(|e| SourceError::Decode(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| SourceError::Decode(e.to_string()))?
        };
        debug!(path = %path.display(), "cluster snapshot loaded");
        Ok(Self::new(snapshot))
    }
}

impl ClusterSource for SnapshotSource {
    fn list_nodes(&self) -> SourceResult<Vec<Node>> {
        Ok(self.snapshot.nodes.clone())
    }

    fn list_pods(&self) -> SourceResult<Vec<Pod>> {
        Ok(self.snapshot.pods.clone())
    }

    fn list_objects(&self, kind: ObjectKind) -> SourceResult<Vec<RawObject>> {
        Ok(self.snapshot.objects(kind).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_yaml_snapshot() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
nodes:
  - metadata: {{name: node-a}}
    status: {{allocatable: {{cpu: "4", memory: 8Gi}}}}
services:
  - metadata: {{name: api, namespace: prod}}
    spec: {{clusterIP: None}}
"#
        )
        .unwrap();

        let source = SnapshotSource::from_file(file.path()).unwrap();
        let nodes = source.list_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].allocatable("cpu").value(), 4);
        assert_eq!(source.list_objects(ObjectKind::Service).unwrap().len(), 1);
        assert!(source.list_pods().unwrap().is_empty());
    }

    #[test]
    fn loads_json_snapshot() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"daemonSets": [{{"metadata": {{"name": "agent", "namespace": "kube-system"}}}}]}}"#
        )
        .unwrap();
        let source = SnapshotSource::from_file(file.path()).unwrap();
        let ds = source.list_objects(ObjectKind::DaemonSet).unwrap();
        assert_eq!(ds[0].metadata.key(), "kube-system/agent");
    }

    #[test]
    fn malformed_snapshot_is_a_decode_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{not json").unwrap();
        let err = SnapshotSource::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn empty_source_lists_nothing() {
        for kind in ObjectKind::ALL {
            assert!(EmptySource.list_objects(kind).unwrap().is_empty());
        }
    }
}
