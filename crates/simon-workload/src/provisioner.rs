//! Synthetic node provisioning.
//!
//! Fake nodes are cloned from a template node. Each one also receives a
//! pod for every DaemonSet present in the store, so its resource usage
//! includes the daemon overhead a real node would pick up automatically.

use tracing::info;
use uuid::Uuid;

use simon_core::constants::{ANNO_FAKE, LABEL_HOSTNAME};
use simon_core::validation::ensure_valid_node;
use simon_core::{Node, Pod};
use simon_state::ClusterStore;

use crate::error::WorkloadResult;
use crate::materializer::Materializer;

/// What a provisioning call added to the store.
#[derive(Debug, Clone, Default)]
pub struct ProvisionedNodes {
    pub nodes: Vec<Node>,
    pub daemon_pods: Vec<Pod>,
}

/// Fabricates `<prefix>-NN` nodes and their daemon pods.
#[derive(Clone)]
pub struct FakeNodeProvisioner {
    prefix: String,
    materializer: Materializer,
}

impl FakeNodeProvisioner {
    pub fn new(prefix: impl Into<String>, materializer: Materializer) -> Self {
        Self {
            prefix: prefix.into(),
            materializer,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the synthetic node at `index`.
    pub fn node_name(&self, index: usize) -> String {
        format!("{}-{:02}", self.prefix, index)
    }

    /// Build `count` validated nodes from `template` without storing them.
    pub fn synthesize(&self, count: usize, template: &Node) -> WorkloadResult<Vec<Node>> {
        (0..count)
            .map(|index| {
                let name = self.node_name(index);
                let mut node = template.clone();
                node.metadata.name = name.clone();
                node.metadata.namespace.clear();
                node.metadata.uid = Some(Uuid::new_v4().to_string());
                node.metadata
                    .labels
                    .insert(LABEL_HOSTNAME.to_string(), name);
                node.metadata
                    .annotations
                    .insert(ANNO_FAKE.to_string(), String::new());
                ensure_valid_node(self.materializer.validator().as_ref(), &node)?;
                Ok(node)
            })
            .collect()
    }

    /// Create `count` fake nodes in the store, plus one daemon pod per
    /// stored DaemonSet on each of them.
    ///
    /// Everything is validated first and written in one transaction, so a
    /// failure leaves the store unchanged.
    pub fn provision(
        &self,
        store: &ClusterStore,
        count: usize,
        template: &Node,
    ) -> WorkloadResult<ProvisionedNodes> {
        let nodes = self.synthesize(count, template)?;
        let daemon_sets = store.list_daemon_sets()?;

        let mut daemon_pods = Vec::with_capacity(nodes.len() * daemon_sets.len());
        for node in &nodes {
            for ds in &daemon_sets {
                daemon_pods.push(self.materializer.from_daemon_set(ds, node.name())?);
            }
        }

        store.create_nodes_and_pods(&nodes, &daemon_pods)?;

        info!(
            nodes = nodes.len(),
            daemon_sets = daemon_sets.len(),
            daemon_pods = daemon_pods.len(),
            "fake nodes provisioned"
        );
        Ok(ProvisionedNodes { nodes, daemon_pods })
    }
}
