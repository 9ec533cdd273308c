//! Element expansion
//!
//! `cluster:<c>` expands to the core members of `c`, `remotes:<c>` to its
//! remote members, and a node to itself. HA is enabled for a role as soon
//! as one of its elements is a cluster.

use keel_types::{ClusterId, Element, NodeId};

use crate::error::{Result, TopologyError};
use crate::inventory::Inventory;

/// A role's elements together with the nodes they expand to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub elements: Vec<Element>,

    /// Expanded nodes, in element order, without duplicates
    pub nodes: Vec<NodeId>,

    pub ha_enabled: bool,
}

impl Expansion {
    /// Clusters referenced by `cluster:` elements
    pub fn clusters(&self) -> impl Iterator<Item = &ClusterId> {
        self.elements.iter().filter_map(|e| match e {
            Element::Cluster(c) => Some(c),
            _ => None,
        })
    }

    /// The single cluster element of an HA role
    pub fn single_cluster(&self, role: &str) -> Result<&ClusterId> {
        match self.elements.as_slice() {
            [Element::Cluster(c)] => Ok(c),
            other => Err(TopologyError::NotExactlyOneCluster {
                role: role.to_string(),
                found: other
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Expand a role's elements against the inventory
pub fn expand(elements: &[Element], inventory: &Inventory) -> Result<Expansion> {
    let mut nodes: Vec<NodeId> = Vec::new();
    let mut push = |id: &NodeId| {
        if !nodes.contains(id) {
            nodes.push(id.clone());
        }
    };

    for element in elements {
        match element {
            Element::Node(id) => push(id),
            Element::Cluster(id) => {
                let cluster = inventory
                    .cluster(id)
                    .ok_or_else(|| TopologyError::UnknownCluster(id.clone()))?;
                cluster.members.iter().for_each(&mut push);
            }
            Element::Remotes(id) => {
                let cluster = inventory
                    .cluster(id)
                    .ok_or_else(|| TopologyError::UnknownCluster(id.clone()))?;
                cluster.remote_members.iter().for_each(&mut push);
            }
        }
    }

    Ok(Expansion {
        elements: elements.to_vec(),
        ha_enabled: elements.iter().any(Element::is_cluster),
        nodes,
    })
}
