//! Bind interceptor.
//!
//! The only write path a decision engine has into the synthetic cluster.
//! Binding records the decision in the store and nothing else; no real
//! infrastructure is touched. Each write publishes a `Modified` pod event,
//! which is what the completion detector observes.

use std::fmt;

use tracing::debug;

use simon_core::constants::CONDITION_POD_SCHEDULED;
use simon_core::{Pod, PodCondition, PodPhase};
use simon_state::ClusterStore;

use crate::error::BindError;

/// Namespace and name of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl From<&Pod> for PodRef {
    fn from(pod: &Pod) -> Self {
        Self::new(pod.namespace(), pod.name())
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Clone)]
pub struct BindInterceptor {
    store: ClusterStore,
}

impl BindInterceptor {
    pub fn new(store: ClusterStore) -> Self {
        Self { store }
    }

    /// Assign `pod` to `node_name` and mark it running.
    pub fn bind(&self, pod: &PodRef, node_name: &str) -> Result<(), BindError> {
        let mut current = self.fetch(pod)?;
        current.spec.node_name = Some(node_name.to_string());
        current.status.phase = Some(PodPhase::Running);
        self.write(pod, &current)?;
        debug!(%pod, node = %node_name, "pod bound");
        Ok(())
    }

    /// Record that no node can run `pod`.
    pub fn reject(&self, pod: &PodRef, message: &str) -> Result<(), BindError> {
        let mut current = self.fetch(pod)?;
        current
            .status
            .conditions
            .retain(|c| c.condition_type != CONDITION_POD_SCHEDULED);
        current
            .status
            .conditions
            .push(PodCondition::unschedulable(message));
        current.status.phase = Some(PodPhase::Pending);
        self.write(pod, &current)?;
        debug!(%pod, %message, "pod marked unschedulable");
        Ok(())
    }

    fn fetch(&self, pod: &PodRef) -> Result<Pod, BindError> {
        self.store
            .get_pod(&pod.namespace, &pod.name)
            .map_err(|source| BindError::State {
                pod: pod.to_string(),
                source,
            })?
            .ok_or_else(|| BindError::PodNotFound(pod.to_string()))
    }

    fn write(&self, pod: &PodRef, updated: &Pod) -> Result<(), BindError> {
        self.store
            .update_pod(updated)
            .map_err(|source| BindError::State {
                pod: pod.to_string(),
                source,
            })
    }
}
