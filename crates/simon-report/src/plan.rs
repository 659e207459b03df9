//! Placement plan file.
//!
//! The plan is a `ConfigMap` named `simulator-plan` in `kube-system`
//! whose data holds one JSON-encoded map per workload kind, from
//! `{namespace}/{name}` to the ordered node list.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use simon_core::ConfigMap;
use simon_core::constants::{
    PLAN_CONFIGMAP_NAME, PLAN_CONFIGMAP_NAMESPACE, WORKLOAD_KIND_DEPLOYMENT,
    WORKLOAD_KIND_STATEFULSET,
};
use simon_state::ClusterStore;

use crate::capacity::WorkloadPlacements;
use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPlan {
    pub placements: WorkloadPlacements,
}

impl PlacementPlan {
    pub fn new(placements: WorkloadPlacements) -> Self {
        Self { placements }
    }

    pub fn to_config_map(&self) -> ReportResult<ConfigMap> {
        let mut data = BTreeMap::new();
        data.insert(
            WORKLOAD_KIND_DEPLOYMENT.to_string(),
            encode(&self.placements.deployments)?,
        );
        data.insert(
            WORKLOAD_KIND_STATEFULSET.to_string(),
            encode(&self.placements.stateful_sets)?,
        );
        Ok(ConfigMap::new(
            PLAN_CONFIGMAP_NAMESPACE,
            PLAN_CONFIGMAP_NAME,
            data,
        ))
    }

    pub fn from_config_map(config_map: &ConfigMap) -> ReportResult<Self> {
        Ok(Self::new(WorkloadPlacements {
            deployments: decode(config_map.data.get(WORKLOAD_KIND_DEPLOYMENT))?,
            stateful_sets: decode(config_map.data.get(WORKLOAD_KIND_STATEFULSET))?,
        }))
    }

    pub fn to_yaml(&self) -> ReportResult<String> {
        serde_yaml::to_string(&self.to_config_map()?)
            .map_err(|e| ReportError::Encode(e.to_string()))
    }
}

/// Collect placements from the store and write them to `path`.
pub fn write_plan(
    store: &ClusterStore,
    path: &Path,
    fake_prefix: &str,
) -> ReportResult<PlacementPlan> {
    let plan = PlacementPlan::new(WorkloadPlacements::collect(store, fake_prefix)?);
    std::fs::write(path, plan.to_yaml()?)?;
    info!(
        path = %path.display(),
        deployments = plan.placements.deployments.len(),
        stateful_sets = plan.placements.stateful_sets.len(),
        "placement plan written"
    );
    Ok(plan)
}

pub fn read_plan(path: &Path) -> ReportResult<PlacementPlan> {
    let content = std::fs::read_to_string(path)?;
    let config_map: ConfigMap =
        serde_yaml::from_str(&content).map_err(|e| ReportError::Encode(e.to_string()))?;
    PlacementPlan::from_config_map(&config_map)
}

fn encode(map: &BTreeMap<String, Vec<String>>) -> ReportResult<String> {
    serde_json::to_string(map).map_err(|e| ReportError::Encode(e.to_string()))
}

fn decode(raw: Option<&String>) -> ReportResult<BTreeMap<String, Vec<String>>> {
    match raw {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(raw).map_err(|e| ReportError::Encode(e.to_string()))
        }
        _ => Ok(BTreeMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simon_core::{ObjectMeta, Pod, Provenance};
    use tempfile::TempDir;

    fn test_pod(name: &str, node: &str, kind: &str, workload: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("default", name);
        pod.spec.node_name = Some(node.into());
        Provenance::new(kind, workload, "default").apply(&mut pod.metadata);
        pod
    }

    fn sample_plan() -> PlacementPlan {
        let mut placements = WorkloadPlacements::default();
        placements
            .deployments
            .insert("default/api".into(), vec!["node-a".into(), "simon-00".into()]);
        placements
            .stateful_sets
            .insert("default/db".into(), vec!["node-b".into()]);
        PlacementPlan::new(placements)
    }

    #[test]
    fn config_map_carries_both_kinds() {
        let cm = sample_plan().to_config_map().unwrap();
        assert_eq!(cm.metadata.name, "simulator-plan");
        assert_eq!(cm.metadata.namespace, "kube-system");
        assert_eq!(cm.data["Deployment"], r#"{"default/api":["node-a","simon-00"]}"#);
        assert_eq!(cm.data["StatefulSet"], r#"{"default/db":["node-b"]}"#);
    }

    #[test]
    fn empty_plan_still_has_both_keys() {
        let cm = PlacementPlan::default().to_config_map().unwrap();
        assert_eq!(cm.data["Deployment"], "{}");
        assert_eq!(cm.data["StatefulSet"], "{}");
    }

    #[test]
    fn written_plan_reads_back() {
        let store = ClusterStore::open_in_memory("default-scheduler").unwrap();
        store
            .create_pod(&test_pod("d0", "simon-00", "Deployment", "api"))
            .unwrap();
        store
            .create_pod(&test_pod("d1", "node-a", "Deployment", "api"))
            .unwrap();
        store
            .create_pod(&test_pod("s0", "node-b", "StatefulSet", "db"))
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configmap-simon.yaml");
        let written = write_plan(&store, &path, "simon").unwrap();

        assert_eq!(written, sample_plan());
        assert_eq!(read_plan(&path).unwrap(), written);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("kind: ConfigMap"));
    }

    #[test]
    fn malformed_data_is_an_encode_error() {
        let mut cm = sample_plan().to_config_map().unwrap();
        cm.data.insert("Deployment".into(), "not json".into());
        assert!(matches!(
            PlacementPlan::from_config_map(&cm),
            Err(ReportError::Encode(_))
        ));
    }
}
