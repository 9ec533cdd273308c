//! Placement constraints restricting resources to a node class

use keel_types::{ResourceDefinition, ResourceSpec};

fn node_class_location(resource: &str, class: &str) -> ResourceDefinition {
    let id = format!("l-{}-{}", resource, class);
    ResourceDefinition::new(ResourceSpec::Location {
        definition: format!(
            "location {} {} resource-discovery=exclusive rule 0: OpenStack-role eq {}",
            id, resource, class
        ),
        id,
    })
}

/// `l-<resource>-controller`: run only on controller nodes
pub fn controller_only_location(resource: &str) -> ResourceDefinition {
    node_class_location(resource, "controller")
}

/// `l-<resource>-compute`: run only on compute (remote) nodes
pub fn compute_only_location(resource: &str) -> ResourceDefinition {
    node_class_location(resource, "compute")
}
