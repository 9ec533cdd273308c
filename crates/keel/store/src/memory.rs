//! In-memory store for development and testing.
//!
//! Not suitable for production use: nothing survives the process.

use async_trait::async_trait;
use dashmap::DashMap;
use keel_types::{Cluster, ClusterId, Node, NodeId, Proposal, Role};
use std::sync::Arc;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ClusterStore, NodeStore, ProposalStore, RoleStore};

/// In-memory implementation of every store trait
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    proposals: Arc<DashMap<(String, String), Proposal>>,
    roles: Arc<DashMap<String, Role>>,
    nodes: Arc<DashMap<NodeId, Node>>,
    clusters: Arc<DashMap<ClusterId, Cluster>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an inventory
    pub fn with_inventory(nodes: Vec<Node>, clusters: Vec<Cluster>) -> Self {
        let store = Self::new();
        for node in nodes {
            store.nodes.insert(node.id.clone(), node);
        }
        for cluster in clusters {
            store.clusters.insert(cluster.id.clone(), cluster);
        }
        store
    }
}

#[async_trait]
impl ProposalStore for InMemoryStore {
    async fn get_proposal(&self, service: &str, name: &str) -> StoreResult<Option<Proposal>> {
        Ok(self
            .proposals
            .get(&(service.to_string(), name.to_string()))
            .map(|p| p.clone()))
    }

    async fn save_proposal(&self, mut proposal: Proposal) -> StoreResult<Proposal> {
        let key = (proposal.service.clone(), proposal.name.clone());
        let mut entry = self.proposals.entry(key).or_insert_with(|| proposal.clone());

        // A freshly inserted entry carries the caller's own revision
        if entry.revision != proposal.revision {
            return Err(StoreError::StaleRevision {
                name: proposal.role_name(),
                expected: proposal.revision,
                found: entry.revision,
            });
        }

        proposal.revision += 1;
        *entry = proposal.clone();
        debug!(proposal = %proposal.role_name(), revision = proposal.revision, "Proposal saved");
        Ok(proposal)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn get_role(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self.roles.get(name).map(|r| r.clone()))
    }

    async fn save_role(&self, role: Role) -> StoreResult<()> {
        self.roles.insert(role.name.clone(), role);
        Ok(())
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>> {
        Ok(self.nodes.get(id).map(|n| n.clone()))
    }

    async fn list_nodes(&self) -> StoreResult<Vec<Node>> {
        let mut nodes: Vec<Node> = self.nodes.iter().map(|n| n.clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn save_node(&self, node: Node) -> StoreResult<()> {
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn find_nodes_with_role(&self, role: &str) -> StoreResult<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| n.has_role(role))
            .map(|n| n.clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn get_cluster(&self, id: &ClusterId) -> StoreResult<Option<Cluster>> {
        Ok(self.clusters.get(id).map(|c| c.clone()))
    }

    async fn list_clusters(&self) -> StoreResult<Vec<Cluster>> {
        let mut clusters: Vec<Cluster> = self.clusters.iter().map(|c| c.clone()).collect();
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clusters)
    }

    async fn save_cluster(&self, cluster: Cluster) -> StoreResult<()> {
        self.clusters.insert(cluster.id.clone(), cluster);
        Ok(())
    }

    async fn record_founder(&self, id: &ClusterId, candidate: &NodeId) -> StoreResult<NodeId> {
        // get_mut holds the shard lock, so check-and-set is atomic
        let mut cluster = self
            .clusters
            .get_mut(id)
            .ok_or_else(|| StoreError::ClusterNotFound(id.clone()))?;

        if let Some(existing) = cluster.current_founder() {
            return Ok(existing.clone());
        }

        if !cluster.is_member(candidate) {
            return Err(StoreError::NotAMember {
                cluster: id.clone(),
                node: candidate.clone(),
            });
        }

        cluster.founder = Some(candidate.clone());
        debug!(cluster = %id, founder = %candidate, "Founder recorded");
        Ok(candidate.clone())
    }
}
