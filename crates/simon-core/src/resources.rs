//! Pod and node resource accounting.
//!
//! Pod totals are never stored pre-summed; they are derived on read from
//! the container specs.

use crate::constants::{RESOURCE_CPU, RESOURCE_MEMORY};
use crate::objects::{Pod, ResourceList};
use crate::quantity::Quantity;

/// Effective requests and limits of a pod.
///
/// For each resource: the larger of the sum over regular containers and
/// the maximum over init containers (init containers run one at a time).
pub fn pod_requests_and_limits(pod: &Pod) -> (ResourceList, ResourceList) {
    let mut requests = ResourceList::new();
    let mut limits = ResourceList::new();

    for container in &pod.spec.containers {
        add_into(&mut requests, &container.resources.requests);
        add_into(&mut limits, &container.resources.limits);
    }
    for container in &pod.spec.init_containers {
        max_into(&mut requests, &container.resources.requests);
        max_into(&mut limits, &container.resources.limits);
    }

    (requests, limits)
}

/// Sum of effective requests and limits over a set of pods.
pub fn total_requests_and_limits<'a>(
    pods: impl IntoIterator<Item = &'a Pod>,
) -> (ResourceList, ResourceList) {
    let mut requests = ResourceList::new();
    let mut limits = ResourceList::new();
    for pod in pods {
        let (req, lim) = pod_requests_and_limits(pod);
        add_into(&mut requests, &req);
        add_into(&mut limits, &lim);
    }
    (requests, limits)
}

pub fn cpu(list: &ResourceList) -> Quantity {
    list.get(RESOURCE_CPU).copied().unwrap_or_default()
}

pub fn memory(list: &ResourceList) -> Quantity {
    list.get(RESOURCE_MEMORY).copied().unwrap_or_default()
}

/// `part` as a percentage of `whole`; 0 when `whole` is zero.
pub fn percent(part: Quantity, whole: Quantity) -> f64 {
    if whole.milli_value() <= 0 {
        return 0.0;
    }
    part.milli_value() as f64 / whole.milli_value() as f64 * 100.0
}

fn add_into(target: &mut ResourceList, source: &ResourceList) {
    for (name, qty) in source {
        *target.entry(name.clone()).or_default() += *qty;
    }
}

fn max_into(target: &mut ResourceList, source: &ResourceList) {
    for (name, qty) in source {
        let slot = target.entry(name.clone()).or_default();
        if *qty > *slot {
            *slot = *qty;
        }
    }
}
