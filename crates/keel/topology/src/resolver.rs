//! Topology Resolver
//!
//! Builds the default `elements` mapping of a service from the inventory:
//!
//! 1. Ineligible nodes (administrative, storage-only) leave the pool.
//! 2. A controller is picked: the first controller-intended node, else the
//!    first remaining node. The controller role gets the cluster holding the
//!    controller, else the first cluster; that cluster's core members leave
//!    the pool.
//! 3. The pool is partitioned into capability buckets by precedence; a node
//!    lands in the first bucket whose predicate it satisfies, or in the
//!    default bucket.
//!
//! Nodes are visited in id order, so an unchanged inventory always yields
//! an unchanged mapping.

use keel_types::{Element, Elements, IntendedRole, Node, NodeId};
use tracing::debug;

use crate::constraints::roles;
use crate::inventory::Inventory;

/// When the administrative server leaves the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminExclusion {
    Always,
    /// Only when some other node is available
    WhenOthersExist,
}

/// A capability bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    pub role: String,
    pub matches: fn(&Node) -> bool,
}

impl Bucket {
    pub fn new(role: impl Into<String>, matches: fn(&Node) -> bool) -> Self {
        Self {
            role: role.into(),
            matches,
        }
    }
}

/// Resolver for one service
#[derive(Debug, Clone)]
pub struct TopologyResolver {
    controller_role: String,
    admin: AdminExclusion,
    exclude_storage: bool,
    /// When any pool node carries this intent, keep only those
    restrict_pool_to: Option<IntendedRole>,
    buckets: Vec<Bucket>,
    default_role: Option<String>,
}

impl TopologyResolver {
    pub fn new(controller_role: impl Into<String>) -> Self {
        Self {
            controller_role: controller_role.into(),
            admin: AdminExclusion::Always,
            exclude_storage: false,
            restrict_pool_to: None,
            buckets: Vec::new(),
            default_role: None,
        }
    }

    /// Resolver of the database service
    pub fn database() -> Self {
        Self::new(roles::DATABASE_SERVER)
    }

    /// Resolver of the compute service
    pub fn compute() -> Self {
        Self::new(roles::COMPUTE_CONTROLLER)
            .with_admin_exclusion(AdminExclusion::WhenOthersExist)
            .excluding_storage()
            .restricting_pool_to(IntendedRole::Compute)
            .with_bucket(Bucket::new(roles::COMPUTE_HYPERV, Node::is_hyperv_target))
            .with_bucket(Bucket::new(
                roles::COMPUTE_KVM,
                Node::supports_hardware_virtualization,
            ))
            .with_bucket(Bucket::new(roles::COMPUTE_XEN, Node::supports_xen))
            .with_default_role(roles::COMPUTE_QEMU)
    }

    pub fn with_admin_exclusion(mut self, admin: AdminExclusion) -> Self {
        self.admin = admin;
        self
    }

    pub fn excluding_storage(mut self) -> Self {
        self.exclude_storage = true;
        self
    }

    pub fn restricting_pool_to(mut self, intent: IntendedRole) -> Self {
        self.restrict_pool_to = Some(intent);
        self
    }

    /// Append a bucket; earlier buckets take precedence
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.push(bucket);
        self
    }

    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    /// Compute the default `elements` mapping
    pub fn resolve(&self, inventory: &Inventory) -> Elements {
        let mut elements = self.empty_elements();

        let mut pool: Vec<&Node> = inventory.nodes().iter().collect();
        match self.admin {
            AdminExclusion::Always => pool.retain(|n| !n.is_admin()),
            AdminExclusion::WhenOthersExist if pool.len() > 1 => pool.retain(|n| !n.is_admin()),
            AdminExclusion::WhenOthersExist => {}
        }
        if self.exclude_storage {
            pool.retain(|n| !n.is_storage_only());
        }

        let controller_at = pool
            .iter()
            .position(|n| n.intended_role == IntendedRole::Controller)
            .or(if pool.is_empty() { None } else { Some(0) });
        let Some(controller_at) = controller_at else {
            debug!(role = %self.controller_role, "No eligible nodes");
            return elements;
        };
        let controller = pool.remove(controller_at);
        if pool.is_empty() {
            pool.push(controller);
        }

        if let Some(intent) = &self.restrict_pool_to {
            if pool.iter().any(|n| &n.intended_role == intent) {
                pool.retain(|n| &n.intended_role == intent);
            }
        }

        let controller_cluster = inventory
            .cluster_of(&controller.id)
            .or_else(|| inventory.clusters().first());
        if let Some(cluster) = controller_cluster {
            pool.retain(|n| !cluster.is_member(&n.id));
            elements.set(
                self.controller_role.clone(),
                vec![Element::Cluster(cluster.id.clone())],
            );
        }

        let mut assigned: Vec<(String, NodeId)> = Vec::new();
        for node in pool {
            let role = self
                .buckets
                .iter()
                .find(|b| (b.matches)(node))
                .map(|b| b.role.as_str())
                .or(self.default_role.as_deref());
            if let Some(role) = role {
                assigned.push((role.to_string(), node.id.clone()));
            }
        }

        for (role, node) in assigned {
            let mut list = elements.get(&role).to_vec();
            list.push(Element::Node(node));
            elements.set(role, list);
        }

        debug!(
            role = %self.controller_role,
            controller = %controller.id,
            "Topology resolved"
        );
        elements
    }

    fn empty_elements(&self) -> Elements {
        std::iter::once(self.controller_role.clone())
            .chain(self.buckets.iter().map(|b| b.role.clone()))
            .chain(self.default_role.clone())
            .map(|role| (role, Vec::new()))
            .collect()
    }
}
