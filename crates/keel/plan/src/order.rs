//! Dependency orders over upstream resources

use std::collections::BTreeSet;

use keel_types::{ResourceDefinition, ResourceSpec};

/// Cluster resources a compute evacuation step depends on
pub const UPSTREAM_RESOURCES: &[&str] = &[
    "postgresql",
    "rabbitmq",
    "cl-keystone",
    "cl-g-glance",
    "cl-g-cinder-controller",
    "cl-neutron-server",
    "cl-g-neutron-agents",
    "cl-g-nova-controller",
];

/// Order `target` after whichever of `upstream` already exist
///
/// Returns `None` when none of them exist. A set of several upstream
/// resources is grouped so they may start in parallel.
pub fn order_only_existing(
    id: &str,
    upstream: &[&str],
    target: &str,
    existing: &BTreeSet<String>,
) -> Option<ResourceDefinition> {
    let present: Vec<&str> = upstream
        .iter()
        .copied()
        .filter(|r| existing.contains(*r))
        .collect();

    let ordering = match present.as_slice() {
        [] => return None,
        [single] => format!("{} {}", single, target),
        many => format!("( {} ) {}", many.join(" "), target),
    };

    Some(ResourceDefinition::new(ResourceSpec::Order {
        id: id.to_string(),
        score: "Mandatory".to_string(),
        ordering,
    }))
}
