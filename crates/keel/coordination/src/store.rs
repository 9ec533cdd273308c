//! Shared coordination store
//!
//! Holds which nodes have posted which mark keys. Real deployments keep
//! this in the node attribute store every member can read; tests and
//! single-process runs use [`InMemoryCoordinationStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use keel_types::NodeId;

use crate::error::Result;

/// Posted-mark bookkeeping shared by all nodes of a cluster
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Record that `node` posted `key`
    async fn post(&self, node: &NodeId, key: &str) -> Result<()>;

    /// Nodes that have posted `key`
    async fn posted(&self, key: &str) -> Result<BTreeSet<NodeId>>;

    /// Forget every mark posted by `node`
    async fn reset(&self, node: &NodeId) -> Result<()>;
}

/// In-memory coordination store
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinationStore {
    marks: Arc<DashMap<String, BTreeSet<NodeId>>>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn post(&self, node: &NodeId, key: &str) -> Result<()> {
        self.marks
            .entry(key.to_string())
            .or_default()
            .insert(node.clone());
        Ok(())
    }

    async fn posted(&self, key: &str) -> Result<BTreeSet<NodeId>> {
        Ok(self
            .marks
            .get(key)
            .map(|nodes| nodes.clone())
            .unwrap_or_default())
    }

    async fn reset(&self, node: &NodeId) -> Result<()> {
        for mut entry in self.marks.iter_mut() {
            entry.value_mut().remove(node);
        }
        self.marks.retain(|_, nodes| !nodes.is_empty());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_and_reset() {
        let store = InMemoryCoordinationStore::new();
        let a = NodeId::new("a");
        let b = NodeId::new("b");

        store.post(&a, "database_ha_resources").await.unwrap();
        store.post(&b, "database_ha_resources").await.unwrap();
        store.post(&a, "nova_compute_before_ha").await.unwrap();

        assert_eq!(store.posted("database_ha_resources").await.unwrap().len(), 2);

        store.reset(&a).await.unwrap();
        let posted = store.posted("database_ha_resources").await.unwrap();
        assert_eq!(posted.into_iter().collect::<Vec<_>>(), vec![b]);
        assert!(store.posted("nova_compute_before_ha").await.unwrap().is_empty());
    }
}
