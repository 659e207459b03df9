//! Capacity aggregation over the final cluster state.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use simon_core::constants::{WORKLOAD_KIND_DEPLOYMENT, WORKLOAD_KIND_STATEFULSET};
use simon_core::resources::{cpu, memory, percent, pod_requests_and_limits, total_requests_and_limits};
use simon_core::{Node, Pod, Quantity, ResourceList};
use simon_state::ClusterStore;

use crate::error::ReportResult;

/// Aggregate usage of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUsage {
    pub name: String,
    pub allocatable: ResourceList,
    pub requests: ResourceList,
    pub limits: ResourceList,
    pub pod_count: usize,
    pub fake: bool,
}

/// Usage of one pod relative to the node it runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct PodUsage {
    pub node_name: String,
    /// `{namespace}/{name}`.
    pub pod: String,
    pub node_allocatable: ResourceList,
    pub requests: ResourceList,
    pub limits: ResourceList,
    pub fake: bool,
}

/// A quantity and its share of an allocatable amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Share {
    pub amount: Quantity,
    pub percent: f64,
}

impl Share {
    fn of(amount: Quantity, whole: Quantity) -> Self {
        Self {
            amount,
            percent: percent(amount, whole),
        }
    }
}

impl NodeUsage {
    pub fn cpu_requests(&self) -> Share {
        Share::of(cpu(&self.requests), cpu(&self.allocatable))
    }

    pub fn cpu_limits(&self) -> Share {
        Share::of(cpu(&self.limits), cpu(&self.allocatable))
    }

    pub fn memory_requests(&self) -> Share {
        Share::of(memory(&self.requests), memory(&self.allocatable))
    }

    pub fn memory_limits(&self) -> Share {
        Share::of(memory(&self.limits), memory(&self.allocatable))
    }
}

impl PodUsage {
    pub fn cpu_requests(&self) -> Share {
        Share::of(cpu(&self.requests), cpu(&self.node_allocatable))
    }

    pub fn cpu_limits(&self) -> Share {
        Share::of(cpu(&self.limits), cpu(&self.node_allocatable))
    }

    pub fn memory_requests(&self) -> Share {
        Share::of(memory(&self.requests), memory(&self.node_allocatable))
    }

    pub fn memory_limits(&self) -> Share {
        Share::of(memory(&self.limits), memory(&self.node_allocatable))
    }
}

/// Per-node and per-pod usage, nodes in store order, pods grouped by node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityReport {
    pub nodes: Vec<NodeUsage>,
    pub pods: Vec<PodUsage>,
}

impl CapacityReport {
    pub fn collect(store: &ClusterStore) -> ReportResult<Self> {
        Ok(Self::from_objects(&store.list_nodes()?, &store.list_pods()?))
    }

    /// Pods not assigned to any listed node are left out.
    pub fn from_objects(nodes: &[Node], pods: &[Pod]) -> Self {
        let mut by_node: HashMap<&str, Vec<&Pod>> = HashMap::new();
        for pod in pods {
            if let Some(node) = pod.node_name() {
                by_node.entry(node).or_default().push(pod);
            }
        }

        let mut report = CapacityReport::default();
        for node in nodes {
            let assigned = by_node.get(node.name()).map(Vec::as_slice).unwrap_or_default();
            for pod in assigned {
                let (requests, limits) = pod_requests_and_limits(pod);
                report.pods.push(PodUsage {
                    node_name: node.name().to_string(),
                    pod: pod.key(),
                    node_allocatable: node.status.allocatable.clone(),
                    requests,
                    limits,
                    fake: pod.is_fake(),
                });
            }

            let (requests, limits) = total_requests_and_limits(assigned.iter().copied());
            report.nodes.push(NodeUsage {
                name: node.name().to_string(),
                allocatable: node.status.allocatable.clone(),
                requests,
                limits,
                pod_count: assigned.len(),
                fake: node.is_fake(),
            });
        }
        report
    }
}

/// Nodes each workload's pods landed on, keyed by `{namespace}/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadPlacements {
    pub deployments: BTreeMap<String, Vec<String>>,
    pub stateful_sets: BTreeMap<String, Vec<String>>,
}

impl WorkloadPlacements {
    /// Group placed pods by provenance. Each node list is ordered by
    /// [`adjust_nodes_order`]; pods without a node are left out.
    pub fn from_pods<'a>(pods: impl IntoIterator<Item = &'a Pod>, fake_prefix: &str) -> Self {
        let mut placements = WorkloadPlacements::default();
        for pod in pods {
            let (Some(provenance), Some(node)) = (pod.provenance(), pod.node_name()) else {
                continue;
            };
            let target = match provenance.kind.as_str() {
                WORKLOAD_KIND_DEPLOYMENT => &mut placements.deployments,
                WORKLOAD_KIND_STATEFULSET => &mut placements.stateful_sets,
                _ => continue,
            };
            target
                .entry(provenance.workload_key())
                .or_default()
                .push(node.to_string());
        }
        for nodes in placements
            .deployments
            .values_mut()
            .chain(placements.stateful_sets.values_mut())
        {
            adjust_nodes_order(nodes, fake_prefix);
        }
        placements
    }

    pub fn collect(store: &ClusterStore, fake_prefix: &str) -> ReportResult<Self> {
        Ok(Self::from_pods(&store.list_pods()?, fake_prefix))
    }
}

/// Order node names real first, then synthetic, each group ascending.
///
/// A name is synthetic when it contains `<fake_prefix>-`.
pub fn adjust_nodes_order(nodes: &mut [String], fake_prefix: &str) {
    let marker = format!("{fake_prefix}-");
    nodes.sort_by(|a, b| {
        match (a.contains(&marker), b.contains(&marker)) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.cmp(b),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use simon_core::constants::ANNO_FAKE;
    use simon_core::{Container, ObjectMeta, Provenance};

    fn test_node(name: &str, cpu: i64, mem_gi: i64) -> Node {
        let mut node = Node::default();
        node.metadata.name = name.into();
        node.status
            .allocatable
            .insert("cpu".into(), Quantity::from_value(cpu));
        node.status
            .allocatable
            .insert("memory".into(), Quantity::from_value(mem_gi << 30));
        node
    }

    fn test_pod(name: &str, node: Option<&str>, cpu_milli: i64) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("default", name);
        pod.spec.node_name = node.map(str::to_string);
        let mut container = Container {
            name: "c".into(),
            image: "img".into(),
            ..Container::default()
        };
        container
            .resources
            .requests
            .insert("cpu".into(), Quantity::from_milli(cpu_milli));
        container
            .resources
            .limits
            .insert("cpu".into(), Quantity::from_milli(cpu_milli * 2));
        pod.spec.containers.push(container);
        pod
    }

    fn with_provenance(mut pod: Pod, kind: &str, name: &str) -> Pod {
        Provenance::new(kind, name, "default").apply(&mut pod.metadata);
        pod
    }

    #[test]
    fn adjusts_node_order() {
        let mut nodes: Vec<String> = ["simon-01", "nodeA", "simon-00", "nodeB"]
            .map(String::from)
            .to_vec();
        adjust_nodes_order(&mut nodes, "simon");
        assert_eq!(nodes, ["nodeA", "nodeB", "simon-00", "simon-01"]);
    }

    #[test]
    fn node_usage_sums_assigned_pods() {
        let nodes = [test_node("node-a", 2, 4), test_node("node-b", 4, 4)];
        let pods = [
            test_pod("a", Some("node-a"), 500),
            test_pod("b", Some("node-a"), 500),
            test_pod("pending", None, 1000),
        ];
        let report = CapacityReport::from_objects(&nodes, &pods);

        assert_eq!(report.nodes.len(), 2);
        let a = &report.nodes[0];
        assert_eq!(a.pod_count, 2);
        assert_eq!(a.cpu_requests().amount.milli_value(), 1000);
        assert_eq!(a.cpu_requests().percent, 50.0);
        assert_eq!(a.cpu_limits().percent, 100.0);
        assert_eq!(a.memory_requests().percent, 0.0);
        assert_eq!(report.nodes[1].pod_count, 0);

        assert_eq!(report.pods.len(), 2);
        assert_eq!(report.pods[0].pod, "default/a");
        assert_eq!(report.pods[0].cpu_requests().percent, 25.0);
    }

    #[test]
    fn zero_allocatable_reports_zero_percent() {
        let mut node = test_node("node-a", 0, 0);
        node.status.allocatable.clear();
        let report =
            CapacityReport::from_objects(&[node], &[test_pod("a", Some("node-a"), 100)]);
        assert_eq!(report.nodes[0].cpu_requests().percent, 0.0);
    }

    #[test]
    fn fake_flags_follow_annotations() {
        let mut node = test_node("simon-00", 1, 1);
        node.metadata.annotations.insert(ANNO_FAKE.into(), String::new());
        let mut pod = test_pod("a", Some("simon-00"), 100);
        pod.metadata.annotations.insert(ANNO_FAKE.into(), String::new());
        let report = CapacityReport::from_objects(&[node], &[pod]);
        assert!(report.nodes[0].fake);
        assert!(report.pods[0].fake);
    }

    #[test]
    fn groups_placements_by_workload() {
        let pods = [
            with_provenance(test_pod("d0", Some("simon-00"), 1), "Deployment", "api"),
            with_provenance(test_pod("d1", Some("node-b"), 1), "Deployment", "api"),
            with_provenance(test_pod("d2", Some("node-a"), 1), "Deployment", "api"),
            with_provenance(test_pod("s0", Some("node-a"), 1), "StatefulSet", "db"),
            with_provenance(test_pod("ds", Some("node-a"), 1), "DaemonSet", "agent"),
            with_provenance(test_pod("pending", None, 1), "Deployment", "api"),
            test_pod("bare", Some("node-a"), 1),
        ];
        let placements = WorkloadPlacements::from_pods(&pods, "simon");
        assert_eq!(
            placements.deployments["default/api"],
            ["node-a", "node-b", "simon-00"]
        );
        assert_eq!(placements.stateful_sets["default/db"], ["node-a"]);
        assert_eq!(placements.deployments.len(), 1);
    }
}
