//! Inventory snapshot
//!
//! An immutable view of nodes and clusters, sorted by id so that every
//! computation over it is independent of the order the inventory was
//! gathered in.

use keel_types::{Cluster, ClusterId, Node, NodeId};
use serde::{Deserialize, Serialize};

/// Nodes and clusters known to the deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    nodes: Vec<Node>,

    #[serde(default)]
    clusters: Vec<Cluster>,
}

impl Inventory {
    pub fn new(mut nodes: Vec<Node>, mut clusters: Vec<Cluster>) -> Self {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.dedup_by(|a, b| a.id == b.id);
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        clusters.dedup_by(|a, b| a.id == b.id);
        Self { nodes, clusters }
    }

    /// Re-sort after deserialization
    pub fn normalized(self) -> Self {
        Self::new(self.nodes, self.clusters)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes
            .binary_search_by(|n| n.id.cmp(id))
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.clusters
            .binary_search_by(|c| c.id.cmp(id))
            .ok()
            .map(|i| &self.clusters[i])
    }

    /// Cluster the node is a core member of
    pub fn cluster_of(&self, node: &NodeId) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.is_member(node))
            .or_else(|| {
                self.node(node)
                    .and_then(|n| n.cluster.as_ref())
                    .and_then(|id| self.cluster(id))
            })
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.retain(|c| c.id != cluster.id);
        self.clusters.push(cluster);
        self.normalized()
    }
}
