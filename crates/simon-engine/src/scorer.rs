//! Node filtering and scoring for the built-in engine.
//!
//! Candidate nodes are scored with a weighted combination of:
//! - **Bin-packing** (best-fit): prefer nodes that will be most full after placement
//! - **Balance**: prefer nodes close to the cluster's average utilization
//!
//! Nodes that are cordoned, miss a node-selector label, or lack free CPU or
//! memory are rejected outright.

use std::cmp::Ordering;

use simon_core::config::EngineConfig;
use simon_core::resources::{cpu, memory, pod_requests_and_limits, total_requests_and_limits};
use simon_core::{Labels, Node, Pod};

/// Allocatable capacity and current requests of one node, in milli-units.
#[derive(Debug, Clone)]
pub struct NodeResources {
    pub name: String,
    pub labels: Labels,
    pub allocatable_cpu: i64,
    pub allocatable_memory: i64,
    pub requested_cpu: i64,
    pub requested_memory: i64,
    pub unschedulable: bool,
}

impl NodeResources {
    /// Usage of `node` given every pod currently assigned to it.
    pub fn from_node<'a>(node: &Node, assigned: impl IntoIterator<Item = &'a Pod>) -> Self {
        let (requests, _) = total_requests_and_limits(assigned);
        Self {
            name: node.name().to_string(),
            labels: node.metadata.labels.clone(),
            allocatable_cpu: cpu(&node.status.allocatable).milli_value(),
            allocatable_memory: memory(&node.status.allocatable).milli_value(),
            requested_cpu: cpu(&requests).milli_value(),
            requested_memory: memory(&requests).milli_value(),
            unschedulable: node.spec.unschedulable,
        }
    }

    pub fn free_cpu(&self) -> i64 {
        (self.allocatable_cpu - self.requested_cpu).max(0)
    }

    pub fn free_memory(&self) -> i64 {
        (self.allocatable_memory - self.requested_memory).max(0)
    }

    fn utilization(&self) -> f64 {
        if self.allocatable_memory > 0 {
            self.requested_memory as f64 / self.allocatable_memory as f64
        } else {
            0.5
        }
    }
}

/// What a pod needs from a node.
#[derive(Debug, Clone, Default)]
pub struct PlacementRequirements {
    pub cpu: i64,
    pub memory: i64,
    /// All must match the node's labels.
    pub node_selector: Labels,
}

impl PlacementRequirements {
    pub fn for_pod(pod: &Pod) -> Self {
        let (requests, _) = pod_requests_and_limits(pod);
        Self {
            cpu: cpu(&requests).milli_value(),
            memory: memory(&requests).milli_value(),
            node_selector: pod.spec.node_selector.clone(),
        }
    }
}

/// Scored placement result for a single node.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_name: String,
    /// Composite score, higher is better. Range: 0.0..=100.0.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub bin_packing: f64,
    pub balance: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub bin_packing: f64,
    pub balance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        EngineConfig::default().into()
    }
}

impl From<EngineConfig> for ScoringWeights {
    fn from(config: EngineConfig) -> Self {
        Self {
            bin_packing: config.bin_packing,
            balance: config.balance,
        }
    }
}

/// Whether `node` can take the pod at all.
pub fn fits(node: &NodeResources, req: &PlacementRequirements) -> bool {
    if node.unschedulable {
        return false;
    }
    let labels_match = req
        .node_selector
        .iter()
        .all(|(key, value)| node.labels.get(key) == Some(value));
    labels_match && node.free_cpu() >= req.cpu && node.free_memory() >= req.memory
}

/// Score a single node, or `None` if the pod does not fit.
pub fn score_node(
    node: &NodeResources,
    req: &PlacementRequirements,
    weights: &ScoringWeights,
    cluster_avg_utilization: f64,
) -> Option<NodeScore> {
    if !fits(node, req) {
        return None;
    }

    let projected_cpu = fraction(node.requested_cpu + req.cpu, node.allocatable_cpu);
    let projected_memory = fraction(node.requested_memory + req.memory, node.allocatable_memory);
    let bin_packing = (projected_cpu + projected_memory) / 2.0 * 100.0;

    let balance = (1.0 - (node.utilization() - cluster_avg_utilization).abs()).max(0.0) * 100.0;

    let score = weights.bin_packing * bin_packing + weights.balance * balance;

    Some(NodeScore {
        node_name: node.name.clone(),
        score,
        breakdown: ScoreBreakdown {
            bin_packing,
            balance,
        },
    })
}

/// Score all nodes and return the feasible ones, best first. Equal scores
/// are ordered by node name.
pub fn rank_nodes(
    nodes: &[NodeResources],
    req: &PlacementRequirements,
    weights: &ScoringWeights,
) -> Vec<NodeScore> {
    let cluster_avg = if nodes.is_empty() {
        0.5
    } else {
        nodes.iter().map(NodeResources::utilization).sum::<f64>() / nodes.len() as f64
    };

    let mut scores: Vec<NodeScore> = nodes
        .iter()
        .filter_map(|n| score_node(n, req, weights, cluster_avg))
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node_name.cmp(&b.node_name))
    });
    scores
}

fn fraction(used: i64, capacity: i64) -> f64 {
    if capacity > 0 {
        (used as f64 / capacity as f64).min(1.0)
    } else {
        0.5
    }
}
