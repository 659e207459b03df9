//! Structural validation of synthesized objects.
//!
//! The simulator treats "is this object well-formed" as a pluggable
//! predicate. A failure is a configuration error: the run must not start.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::objects::{Container, Node, Pod};

/// Decides whether a pod or node is well-formed.
///
/// Returns the list of violations; an empty list means valid.
pub trait ObjectValidator: Send + Sync {
    fn validate_pod(&self, pod: &Pod) -> Vec<String>;
    fn validate_node(&self, node: &Node) -> Vec<String>;
}

/// Run the validator over a pod, turning violations into an error.
pub fn ensure_valid_pod(validator: &dyn ObjectValidator, pod: &Pod) -> CoreResult<()> {
    let reasons = validator.validate_pod(pod);
    if reasons.is_empty() {
        return Ok(());
    }
    Err(CoreError::Invalid {
        kind: "pod",
        name: pod.key(),
        reasons,
    })
}

/// Run the validator over a node, turning violations into an error.
pub fn ensure_valid_node(validator: &dyn ObjectValidator, node: &Node) -> CoreResult<()> {
    let reasons = validator.validate_node(node);
    if reasons.is_empty() {
        return Ok(());
    }
    Err(CoreError::Invalid {
        kind: "node",
        name: node.name().to_string(),
        reasons,
    })
}

/// Naming and required-field checks modeled on the cluster API's create
/// validation.
pub struct DefaultValidator {
    dns_label: Regex,
    dns_subdomain: Regex,
}

impl DefaultValidator {
    pub fn new() -> CoreResult<Self> {
        let label = r"[a-z0-9]([-a-z0-9]*[a-z0-9])?";
        let dns_label = Regex::new(&format!("^{label}$"))
            .map_err(|e| CoreError::Config(e.to_string()))?;
        let dns_subdomain = Regex::new(&format!(r"^{label}(\.{label})*$"))
            .map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(Self {
            dns_label,
            dns_subdomain,
        })
    }

    fn is_label(&self, s: &str) -> bool {
        s.len() <= 63 && self.dns_label.is_match(s)
    }

    fn is_subdomain(&self, s: &str) -> bool {
        s.len() <= 253 && self.dns_subdomain.is_match(s)
    }

    fn check_container(
        &self,
        field: &str,
        container: &Container,
        seen: &mut HashSet<String>,
        errors: &mut Vec<String>,
    ) {
        if !self.is_label(&container.name) {
            errors.push(format!("{field}.name: invalid value {:?}", container.name));
        } else if !seen.insert(container.name.clone()) {
            errors.push(format!("{field}.name: duplicate value {:?}", container.name));
        }
        if container.image.trim().is_empty() {
            errors.push(format!("{field}.image: required value"));
        }
        if container.termination_message_policy.is_none() {
            errors.push(format!("{field}.terminationMessagePolicy: required value"));
        }
        if container.image_pull_policy.is_none() {
            errors.push(format!("{field}.imagePullPolicy: required value"));
        }

        let resources = &container.resources;
        for (name, qty) in resources.requests.iter().chain(resources.limits.iter()) {
            if qty.milli_value() < 0 {
                errors.push(format!("{field}.resources[{name}]: must be non-negative"));
            }
        }
        for (name, request) in &resources.requests {
            if let Some(limit) = resources.limits.get(name) {
                if request > limit {
                    errors.push(format!(
                        "{field}.resources.requests[{name}]: must be less than or equal to limit"
                    ));
                }
            }
        }
    }
}

impl ObjectValidator for DefaultValidator {
    fn validate_pod(&self, pod: &Pod) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_subdomain(pod.name()) {
            errors.push(format!("metadata.name: invalid value {:?}", pod.name()));
        }
        if !self.is_label(pod.namespace()) {
            errors.push(format!(
                "metadata.namespace: invalid value {:?}",
                pod.namespace()
            ));
        }
        if pod.spec.containers.is_empty() {
            errors.push("spec.containers: required value".to_string());
        }

        let mut seen = HashSet::new();
        for (i, c) in pod.spec.init_containers.iter().enumerate() {
            self.check_container(&format!("spec.initContainers[{i}]"), c, &mut seen, &mut errors);
        }
        for (i, c) in pod.spec.containers.iter().enumerate() {
            self.check_container(&format!("spec.containers[{i}]"), c, &mut seen, &mut errors);
        }

        if pod.spec.dns_policy.is_none() {
            errors.push("spec.dnsPolicy: required value".to_string());
        }
        if pod.spec.restart_policy.is_none() {
            errors.push("spec.restartPolicy: required value".to_string());
        }

        errors
    }

    fn validate_node(&self, node: &Node) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.is_subdomain(node.name()) {
            errors.push(format!("metadata.name: invalid value {:?}", node.name()));
        }
        for (name, qty) in &node.status.allocatable {
            if qty.milli_value() < 0 {
                errors.push(format!("status.allocatable[{name}]: must be non-negative"));
            }
        }
        errors
    }
}
