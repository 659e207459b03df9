//! Workload-to-pod expansion.
//!
//! Every pod leaving the materializer has been normalized (fresh uid,
//! policy defaults, no volume mounts, provisioning annotation) and checked
//! against the structural validator. A validation failure is returned as
//! [`WorkloadError::Configuration`].

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use simon_core::constants::{
    ANNO_FAKE, ANNO_POD_PROVISIONER, NAMESPACE_DEFAULT, WORKLOAD_KIND_DAEMONSET,
    WORKLOAD_KIND_DEPLOYMENT, WORKLOAD_KIND_STATEFULSET,
};
use simon_core::validation::ensure_valid_pod;
use simon_core::{
    Container, DaemonSet, Deployment, DnsPolicy, ManifestDocument, ObjectMeta, ObjectValidator,
    Pod, PodTemplateSpec, Provenance, PullPolicy, ReplicatedSpec, RestartPolicy, StatefulSet,
    TerminationMessagePolicy,
};

use crate::error::WorkloadResult;

/// Expands workload specs into injectable pods.
#[derive(Clone)]
pub struct Materializer {
    scheduler_name: String,
    validator: Arc<dyn ObjectValidator>,
}

impl Materializer {
    pub fn new(scheduler_name: impl Into<String>, validator: Arc<dyn ObjectValidator>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
            validator,
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }

    pub fn validator(&self) -> &Arc<dyn ObjectValidator> {
        &self.validator
    }

    /// A bare pod: normalized, no provenance.
    pub fn from_pod(&self, mut pod: Pod) -> WorkloadResult<Pod> {
        self.normalize(&mut pod)?;
        Ok(pod)
    }

    pub fn from_deployment(&self, deploy: &Deployment) -> WorkloadResult<Vec<Pod>> {
        self.replicate(WORKLOAD_KIND_DEPLOYMENT, &deploy.metadata, &deploy.spec)
    }

    pub fn from_stateful_set(&self, sts: &StatefulSet) -> WorkloadResult<Vec<Pod>> {
        self.replicate(WORKLOAD_KIND_STATEFULSET, &sts.metadata, &sts.spec)
    }

    /// The daemon pod for one node, already placed on it.
    pub fn from_daemon_set(&self, ds: &DaemonSet, node_name: &str) -> WorkloadResult<Pod> {
        let name = format!(
            "fake-{}-{}-{}",
            WORKLOAD_KIND_DAEMONSET.to_lowercase(),
            ds.metadata.name,
            node_name
        );
        let mut pod = pod_from_template(&ds.spec.template, &ds.metadata, name);
        pod.spec.node_name = Some(node_name.to_string());
        Provenance::new(WORKLOAD_KIND_DAEMONSET, &ds.metadata.name, pod.namespace())
            .apply(&mut pod.metadata);
        self.normalize(&mut pod)?;
        Ok(pod)
    }

    /// Expand every workload document in order. Node and unsupported
    /// documents produce nothing.
    pub fn from_documents<'a>(
        &self,
        docs: impl IntoIterator<Item = &'a ManifestDocument>,
    ) -> WorkloadResult<Vec<Pod>> {
        let mut pods = Vec::new();
        for doc in docs {
            match doc {
                ManifestDocument::Pod(pod) => pods.push(self.from_pod(pod.clone())?),
                ManifestDocument::Deployment(d) => pods.extend(self.from_deployment(d)?),
                ManifestDocument::StatefulSet(s) => pods.extend(self.from_stateful_set(s)?),
                ManifestDocument::Node(_) => {}
                ManifestDocument::Unsupported { kind } => {
                    warn!(%kind, "skipping unsupported workload kind");
                }
            }
        }
        Ok(pods)
    }

    fn replicate(
        &self,
        kind: &str,
        meta: &ObjectMeta,
        spec: &ReplicatedSpec,
    ) -> WorkloadResult<Vec<Pod>> {
        let replicas = spec.replicas.unwrap_or(1).max(1);
        let mut pods = Vec::with_capacity(replicas as usize);
        for ordinal in 0..replicas {
            let name = format!("fake-{}-{}-{}", kind.to_lowercase(), meta.name, ordinal);
            let mut pod = pod_from_template(&spec.template, meta, name);
            Provenance::new(kind, &meta.name, pod.namespace()).apply(&mut pod.metadata);
            self.normalize(&mut pod)?;
            pods.push(pod);
        }
        debug!(%kind, workload = %meta.key(), replicas, "workload expanded");
        Ok(pods)
    }

    /// Apply field defaults, mark the pod as ours, then validate.
    fn normalize(&self, pod: &mut Pod) -> WorkloadResult<()> {
        pod.metadata.uid = Some(Uuid::new_v4().to_string());
        if pod.metadata.namespace.is_empty() {
            pod.metadata.namespace = NAMESPACE_DEFAULT.to_string();
        }

        for container in pod
            .spec
            .init_containers
            .iter_mut()
            .chain(pod.spec.containers.iter_mut())
        {
            normalize_container(container);
        }

        pod.spec.dns_policy.get_or_insert(DnsPolicy::ClusterFirst);
        pod.spec.restart_policy.get_or_insert(RestartPolicy::Always);
        if pod.spec.scheduler_name.as_deref().is_none_or(str::is_empty) {
            pod.spec.scheduler_name = Some(self.scheduler_name.clone());
        }

        pod.metadata
            .annotations
            .insert(ANNO_POD_PROVISIONER.to_string(), self.scheduler_name.clone());
        pod.metadata
            .annotations
            .insert(ANNO_FAKE.to_string(), String::new());

        ensure_valid_pod(self.validator.as_ref(), pod)?;
        Ok(())
    }
}

fn normalize_container(container: &mut Container) {
    container
        .termination_message_policy
        .get_or_insert(TerminationMessagePolicy::FallbackToLogsOnError);
    container
        .image_pull_policy
        .get_or_insert(PullPolicy::IfNotPresent);
    if let Some(ctx) = container.security_context.as_mut() {
        if ctx.privileged.is_some() {
            ctx.privileged = Some(false);
        }
    }
    container.volume_mounts.clear();
}

/// A pod shaped by a template, named and placed in the workload's namespace.
fn pod_from_template(template: &PodTemplateSpec, owner: &ObjectMeta, name: String) -> Pod {
    let namespace = if owner.namespace.is_empty() {
        NAMESPACE_DEFAULT
    } else {
        &owner.namespace
    };
    let mut metadata = ObjectMeta::named(namespace, &name);
    metadata.labels = template.metadata.labels.clone();
    metadata.annotations = template.metadata.annotations.clone();
    Pod {
        metadata,
        spec: template.spec.clone(),
        ..Pod::default()
    }
}
