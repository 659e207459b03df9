//! Cluster object model.
//!
//! A deliberately small subset of the cluster API: just the fields the
//! simulator, its decision engine, and its reports read or write. All
//! types use the API's camelCase field names so that manifests and
//! cluster dumps deserialize directly. Unknown fields are dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::*;
use crate::quantity::Quantity;

/// Label or annotation set.
pub type Labels = BTreeMap<String, String>;

/// Named resource amounts (`cpu`, `memory`, extended resources).
pub type ResourceList = BTreeMap<String, Quantity>;

// ── Object kinds ──────────────────────────────────────────────────

/// Every kind the synthetic store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Node,
    Pod,
    PodDisruptionBudget,
    Service,
    StorageClass,
    PersistentVolumeClaim,
    ReplicationController,
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 11] = [
        ObjectKind::Node,
        ObjectKind::Pod,
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

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Node => "Node",
            ObjectKind::Pod => "Pod",
            ObjectKind::PodDisruptionBudget => "PodDisruptionBudget",
            ObjectKind::Service => "Service",
            ObjectKind::StorageClass => "StorageClass",
            ObjectKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ObjectKind::ReplicationController => "ReplicationController",
            ObjectKind::Deployment => "Deployment",
            ObjectKind::ReplicaSet => "ReplicaSet",
            ObjectKind::StatefulSet => "StatefulSet",
            ObjectKind::DaemonSet => "DaemonSet",
        }
    }

    /// Cluster-scoped kinds are keyed by name alone.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, ObjectKind::Node | ObjectKind::StorageClass)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Metadata ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Labels,
}

impl ObjectMeta {
    pub fn named(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    /// `{namespace}/{name}`, or just the name for cluster-scoped objects.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    /// True when the object was fabricated by the simulator.
    pub fn is_fake(&self) -> bool {
        self.has_annotation(ANNO_FAKE)
    }
}

// ── Node ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NodeSpec,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unschedulable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: ResourceList,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: ResourceList,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn allocatable(&self, resource: &str) -> Quantity {
        self.status
            .allocatable
            .get(resource)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_fake(&self) -> bool {
        self.metadata.is_fake()
    }
}

// ── Pod ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Volumes are carried through untouched; no volume binding is modeled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_policy: Option<DnsPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_message_policy: Option<TerminationMessagePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<PullPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: ResourceList,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationMessagePolicy {
    File,
    FallbackToLogsOnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsPolicy {
    ClusterFirst,
    ClusterFirstWithHostNet,
    Default,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PodPhase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PodCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PodCondition {
    /// The condition a decision engine records when no node fits.
    pub fn unschedulable(message: impl Into<String>) -> Self {
        Self {
            condition_type: CONDITION_POD_SCHEDULED.to_string(),
            status: ConditionStatus::False,
            reason: Some(REASON_UNSCHEDULABLE.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn is_unschedulable(&self) -> bool {
        self.condition_type == CONDITION_POD_SCHEDULED
            && self.status == ConditionStatus::False
            && self.reason.as_deref() == Some(REASON_UNSCHEDULABLE)
    }
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn key(&self) -> String {
        self.metadata.key()
    }

    pub fn node_name(&self) -> Option<&str> {
        self.spec.node_name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn scheduler_name(&self) -> &str {
        self.spec
            .scheduler_name
            .as_deref()
            .unwrap_or(DEFAULT_SCHEDULER_NAME)
    }

    pub fn is_fake(&self) -> bool {
        self.metadata.is_fake()
    }

    /// The first `PodScheduled=False/Unschedulable` condition, if any.
    pub fn unschedulable_condition(&self) -> Option<&PodCondition> {
        self.status.conditions.iter().find(|c| c.is_unschedulable())
    }

    pub fn provenance(&self) -> Option<Provenance> {
        Provenance::from_meta(&self.metadata)
    }
}

// ── Provenance ────────────────────────────────────────────────────

/// The workload a materialized pod was expanded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Provenance {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl Provenance {
    pub fn new(kind: &str, name: &str, namespace: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Read the triple back from annotations. All three must be present.
    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        Some(Self {
            kind: meta.annotations.get(ANNO_WORKLOAD_KIND)?.clone(),
            name: meta.annotations.get(ANNO_WORKLOAD_NAME)?.clone(),
            namespace: meta.annotations.get(ANNO_WORKLOAD_NAMESPACE)?.clone(),
        })
    }

    pub fn apply(&self, meta: &mut ObjectMeta) {
        meta.annotations
            .insert(ANNO_WORKLOAD_KIND.to_string(), self.kind.clone());
        meta.annotations
            .insert(ANNO_WORKLOAD_NAME.to_string(), self.name.clone());
        meta.annotations
            .insert(ANNO_WORKLOAD_NAMESPACE.to_string(), self.namespace.clone());
    }

    /// `{namespace}/{name}`, the key used in the placement plan.
    pub fn workload_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

// ── Workloads ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

/// Spec shared by replicated workloads (Deployment, StatefulSet).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicatedSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatefulSet {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicatedSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonSetSpec {
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonSet {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DaemonSetSpec,
}

// ── Opaque objects ────────────────────────────────────────────────

/// An object the simulator stores but never interprets.
///
/// Metadata is typed so the store can key it; every other field is kept
/// verbatim for the decision engine to consult.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

// ── Placement plan ────────────────────────────────────────────────

/// Minimal named/namespaced config object carrying string data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(namespace: &str, name: &str, data: BTreeMap<String, String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta::named(namespace, name),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_deserializes_from_api_shape() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web", "namespace": "prod", "labels": {"app": "web"}},
            "spec": {
                "schedulerName": "custom",
                "containers": [{
                    "name": "main",
                    "image": "nginx",
                    "imagePullPolicy": "Always",
                    "resources": {"requests": {"cpu": "250m", "memory": "64Mi"}}
                }]
            },
            "status": {"conditions": [
                {"type": "PodScheduled", "status": "False", "reason": "Unschedulable", "message": "0/3 nodes"}
            ]}
        }"#;
        let pod: Pod = serde_json::from_str(json).unwrap();
        assert_eq!(pod.key(), "prod/web");
        assert_eq!(pod.scheduler_name(), "custom");
        assert_eq!(pod.spec.containers[0].image_pull_policy, Some(PullPolicy::Always));
        assert_eq!(
            pod.spec.containers[0].resources.requests["cpu"].milli_value(),
            250
        );
        let cond = pod.unschedulable_condition().unwrap();
        assert_eq!(cond.message.as_deref(), Some("0/3 nodes"));
    }

    #[test]
    fn scheduler_name_defaults() {
        assert_eq!(Pod::default().scheduler_name(), DEFAULT_SCHEDULER_NAME);
    }

    #[test]
    fn empty_node_name_counts_as_unassigned() {
        let mut pod = Pod::default();
        pod.spec.node_name = Some(String::new());
        assert_eq!(pod.node_name(), None);
        pod.spec.node_name = Some("node-a".to_string());
        assert_eq!(pod.node_name(), Some("node-a"));
    }

    #[test]
    fn provenance_requires_all_three_annotations() {
        let mut meta = ObjectMeta::named("ns", "pod-0");
        assert!(Provenance::from_meta(&meta).is_none());

        let p = Provenance::new(WORKLOAD_KIND_DEPLOYMENT, "api", "ns");
        p.apply(&mut meta);
        assert_eq!(Provenance::from_meta(&meta), Some(p.clone()));
        assert_eq!(p.workload_key(), "ns/api");

        meta.annotations.remove(ANNO_WORKLOAD_NAME);
        assert!(Provenance::from_meta(&meta).is_none());
    }

    #[test]
    fn scheduled_true_is_not_unschedulable() {
        let mut cond = PodCondition::unschedulable("no fit");
        assert!(cond.is_unschedulable());
        cond.status = ConditionStatus::True;
        assert!(!cond.is_unschedulable());
    }

    #[test]
    fn raw_object_keeps_unknown_fields() {
        let json = r#"{"kind":"Service","metadata":{"name":"svc","namespace":"a"},"spec":{"ports":[{"port":80}]}}"#;
        let raw: RawObject = serde_json::from_str(json).unwrap();
        assert_eq!(raw.metadata.key(), "a/svc");
        assert_eq!(raw.body["spec"]["ports"][0]["port"], 80);
        let back: Value = serde_json::to_value(&raw).unwrap();
        assert_eq!(back["kind"], "Service");
    }

    #[test]
    fn cluster_scoped_kinds() {
        assert!(ObjectKind::Node.is_cluster_scoped());
        assert!(ObjectKind::StorageClass.is_cluster_scoped());
        assert!(!ObjectKind::Pod.is_cluster_scoped());
    }
}
