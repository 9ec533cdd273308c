//! A node's view of its cluster during convergence

use keel_coordination::{FounderResolver, MarkOutcome, SyncBarrier};
use keel_store::ClusterStore;
use keel_types::{ClusterId, NodeId, SyncMark, SyncPhase};

use crate::error::Result;

/// The converging node, its cluster's founder and core members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub node: NodeId,
    pub cluster: ClusterId,
    pub founder: NodeId,
    pub members: Vec<NodeId>,
}

impl ClusterMember {
    pub async fn resolve(
        node: NodeId,
        cluster: ClusterId,
        clusters: &dyn ClusterStore,
        founders: &FounderResolver,
    ) -> Result<Self> {
        let founder = founders.founder(&cluster).await?;
        let members = clusters
            .get_cluster(&cluster)
            .await?
            .map(|c| c.members)
            .unwrap_or_default();
        Ok(Self {
            node,
            cluster,
            founder,
            members,
        })
    }

    pub fn is_founder(&self) -> bool {
        self.node == self.founder
    }

    /// Take part in a phased mark
    pub async fn mark(
        &self,
        barrier: &SyncBarrier,
        phase: SyncPhase,
        mark: &SyncMark,
    ) -> Result<MarkOutcome> {
        Ok(barrier
            .mark(phase, mark, &self.node, &self.founder, &self.members)
            .await?)
    }
}
