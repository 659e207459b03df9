//! Built-in decision engine.
//!
//! Places pending pods one at a time, in arrival order: rebuild per-node
//! usage from the store, rank feasible nodes, bind to the best. When no
//! node fits the pod is marked unschedulable instead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use simon_core::Pod;
use simon_state::ClusterStore;

use crate::binder::{BindInterceptor, PodRef};
use crate::engine::{DecisionEngine, EngineContext, EngineFuture};
use crate::error::EngineResult;
use crate::scorer::{NodeResources, PlacementRequirements, ScoringWeights, rank_nodes};

/// Attempts per pod before a bind failure is given up on.
const BIND_ATTEMPTS: usize = 3;

/// Outcome of one placement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Bound(String),
    Unschedulable(String),
    /// Already placed or gone by the time it was looked at.
    Skipped,
}

pub struct FitEngine {
    weights: ScoringWeights,
}

impl FitEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Decide where one pod goes and record the decision.
    pub fn place(
        &self,
        store: &ClusterStore,
        binder: &BindInterceptor,
        pod_ref: &PodRef,
    ) -> EngineResult<Placement> {
        let Some(pod) = store.get_pod(&pod_ref.namespace, &pod_ref.name)? else {
            return Ok(Placement::Skipped);
        };
        if pod.node_name().is_some() {
            return Ok(Placement::Skipped);
        }

        let nodes = self.node_resources(store)?;
        let req = PlacementRequirements::for_pod(&pod);
        let ranked = rank_nodes(&nodes, &req, &self.weights);

        let Some(best) = ranked.first() else {
            let message = format!(
                "0/{} nodes are available: insufficient resources",
                nodes.len()
            );
            binder.reject(pod_ref, &message)?;
            info!(pod = %pod_ref, %message, "pod unschedulable");
            return Ok(Placement::Unschedulable(message));
        };

        debug!(
            pod = %pod_ref,
            node = %best.node_name,
            score = best.score,
            candidates = ranked.len(),
            "node selected"
        );
        binder.bind(pod_ref, &best.node_name)?;
        Ok(Placement::Bound(best.node_name.clone()))
    }

    fn node_resources(&self, store: &ClusterStore) -> EngineResult<Vec<NodeResources>> {
        let pods = store.list_pods()?;
        let mut by_node: HashMap<&str, Vec<&Pod>> = HashMap::new();
        for pod in &pods {
            if let Some(node) = pod.node_name() {
                by_node.entry(node).or_default().push(pod);
            }
        }
        Ok(store
            .list_nodes()?
            .iter()
            .map(|node| {
                let assigned = by_node.get(node.name()).into_iter().flatten().copied();
                NodeResources::from_node(node, assigned)
            })
            .collect())
    }

    fn place_with_retry(&self, ctx: &EngineContext, pod_ref: &PodRef) {
        for attempt in 1..=BIND_ATTEMPTS {
            match self.place(&ctx.store, &ctx.binder, pod_ref) {
                Ok(_) => return,
                Err(e) => warn!(pod = %pod_ref, attempt, error = %e, "placement failed"),
            }
        }
        warn!(pod = %pod_ref, "giving up on pod");
    }
}

impl Default for FitEngine {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl DecisionEngine for FitEngine {
    fn name(&self) -> &str {
        "fit"
    }

    fn run(
        self: Arc<Self>,
        mut ctx: EngineContext,
        mut shutdown: watch::Receiver<bool>,
    ) -> EngineFuture {
        Box::pin(async move {
            info!(engine = %self.name(), "decision engine started");
            loop {
                tokio::select! {
                    event = ctx.pending.recv() => {
                        let Some(event) = event else { break };
                        let pod_ref = PodRef::from(&event.pod);
                        self.place_with_retry(&ctx, &pod_ref);
                    }
                    _ = shutdown.changed() => {
                        debug!("decision engine shutting down");
                        break;
                    }
                }
            }
            Ok(())
        })
    }
}
