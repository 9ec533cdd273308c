//! Storage trait definitions

use crate::error::StoreResult;
use async_trait::async_trait;
use keel_types::{Cluster, ClusterId, Node, NodeId, Proposal, Role};

/// Combined storage trait
pub trait Store: ProposalStore + RoleStore + NodeStore + ClusterStore + Send + Sync {}

impl<T> Store for T where T: ProposalStore + RoleStore + NodeStore + ClusterStore + Send + Sync {}

/// Storage for proposals
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Get a proposal by service and instance name
    async fn get_proposal(&self, service: &str, name: &str) -> StoreResult<Option<Proposal>>;

    /// Persist a proposal, bumping its revision.
    ///
    /// Fails with `StaleRevision` when the stored revision differs from the
    /// one the caller read.
    async fn save_proposal(&self, proposal: Proposal) -> StoreResult<Proposal>;
}

/// Storage for applied roles
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_role(&self, name: &str) -> StoreResult<Option<Role>>;

    async fn save_role(&self, role: Role) -> StoreResult<()>;
}

/// Storage for inventory nodes
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn get_node(&self, id: &NodeId) -> StoreResult<Option<Node>>;

    async fn list_nodes(&self) -> StoreResult<Vec<Node>>;

    async fn save_node(&self, node: Node) -> StoreResult<()>;

    /// Nodes whose run-list contains the role, sorted by id
    async fn find_nodes_with_role(&self, role: &str) -> StoreResult<Vec<Node>>;
}

/// Storage for clusters and their recorded founders
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_cluster(&self, id: &ClusterId) -> StoreResult<Option<Cluster>>;

    async fn list_clusters(&self) -> StoreResult<Vec<Cluster>>;

    async fn save_cluster(&self, cluster: Cluster) -> StoreResult<()>;

    /// Record `candidate` as founder unless a founder that is still a core
    /// member is already recorded. Returns the founder in effect; the check
    /// and the write happen atomically.
    async fn record_founder(&self, id: &ClusterId, candidate: &NodeId) -> StoreResult<NodeId>;
}
