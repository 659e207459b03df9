//! Well-known names, annotations, and stop reasons.

/// Scheduler name used when a pod does not set one.
pub const DEFAULT_SCHEDULER_NAME: &str = "default-scheduler";

/// Prefix for synthetic node names (`simon-00`, `simon-01`, ...).
pub const FAKE_NODE_NAME_PREFIX: &str = "simon";

/// Stop reason recorded when every injected pod was bound.
pub const STOP_REASON_SUCCESS: &str = "everything is ok";

/// Marks a pod as provisioned by this orchestrator; value is the scheduler name.
pub const ANNO_POD_PROVISIONER: &str = "simon/provisioned-by";
/// Marks a node or pod as synthetic. Presence is what matters.
pub const ANNO_FAKE: &str = "simon/fake";
pub const ANNO_WORKLOAD_KIND: &str = "simon/workload-kind";
pub const ANNO_WORKLOAD_NAME: &str = "simon/workload-name";
pub const ANNO_WORKLOAD_NAMESPACE: &str = "simon/workload-namespace";

pub const LABEL_HOSTNAME: &str = "kubernetes.io/hostname";

pub const WORKLOAD_KIND_DEPLOYMENT: &str = "Deployment";
pub const WORKLOAD_KIND_STATEFULSET: &str = "StatefulSet";
pub const WORKLOAD_KIND_DAEMONSET: &str = "DaemonSet";

pub const NAMESPACE_DEFAULT: &str = "default";

/// Placement plan object written at the end of a run.
pub const PLAN_CONFIGMAP_NAME: &str = "simulator-plan";
pub const PLAN_CONFIGMAP_NAMESPACE: &str = "kube-system";
pub const PLAN_FILE_NAME: &str = "configmap-simon.yaml";

/// Condition type/reason the decision engine uses for "no node fits".
pub const CONDITION_POD_SCHEDULED: &str = "PodScheduled";
pub const REASON_UNSCHEDULABLE: &str = "Unschedulable";

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";
