//! Initial streaming replication setup
//!
//! Runs once per node, before the HA resources exist:
//!
//! 1. `wait-` mark: standbys wait until the founder is ready.
//! 2. The founder starts the primary and ensures the replica user; every
//!    other member clones its data directory from the founder.
//! 3. `create-` then `sync-` mark: the founder stops the primary only once
//!    every member has cloned.
//! 4. The node records that setup is done; later runs skip every step but
//!    still pass the marks.

use std::fmt;

use async_trait::async_trait;
use keel_coordination::SyncBarrier;
use keel_plan::marks;
use keel_types::SyncPhase;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::member::ClusterMember;

/// Where and as whom standbys connect for the initial clone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSource {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Local database operations used by the setup sequence
#[async_trait]
pub trait ReplicationAgent: Send + Sync {
    async fn setup_done(&self) -> Result<bool>;

    async fn start_primary(&self) -> Result<()>;

    async fn ensure_replica_user(&self, user: &str, password: &str) -> Result<()>;

    /// Replace the local data directory with a copy of the primary's
    async fn clone_from(&self, source: &ReplicaSource) -> Result<()>;

    async fn stop_primary(&self) -> Result<()>;

    async fn mark_setup_done(&self) -> Result<()>;
}

/// Run the setup sequence on one member
#[instrument(skip(barrier, agent, source), fields(node = %member.node))]
pub async fn setup_streaming_replication(
    member: &ClusterMember,
    barrier: &SyncBarrier,
    agent: &dyn ReplicationAgent,
    source: &ReplicaSource,
    revision: u64,
) -> Result<()> {
    let mark = marks::database_streaming_replication_setup(revision);
    let pending = !agent.setup_done().await?;
    if !pending {
        debug!("Streaming replication already set up");
    }

    member.mark(barrier, SyncPhase::Wait, &mark).await?;

    if pending {
        if member.is_founder() {
            agent.start_primary().await?;
            agent.ensure_replica_user(&source.user, &source.password).await?;
        } else {
            agent.clone_from(source).await?;
        }
    }

    member.mark(barrier, SyncPhase::Create, &mark).await?;
    member.mark(barrier, SyncPhase::Sync, &mark).await?;

    if pending {
        if member.is_founder() {
            agent.stop_primary().await?;
        }
        agent.mark_setup_done().await?;
        info!("Streaming replication set up");
    }
    Ok(())
}

/// One agent operation, as recorded by [`RecordingReplicationAgent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationStep {
    StartPrimary,
    EnsureReplicaUser(String),
    CloneFrom(String),
    StopPrimary,
    MarkDone,
}

impl fmt::Display for ReplicationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationStep::StartPrimary => f.write_str("start primary"),
            ReplicationStep::EnsureReplicaUser(user) => write!(f, "ensure replica user {}", user),
            ReplicationStep::CloneFrom(address) => write!(f, "clone from {}", address),
            ReplicationStep::StopPrimary => f.write_str("stop primary"),
            ReplicationStep::MarkDone => f.write_str("mark done"),
        }
    }
}

/// Agent that only records what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingReplicationAgent {
    steps: Mutex<Vec<ReplicationStep>>,
    done: Mutex<bool>,
}

impl RecordingReplicationAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn steps(&self) -> Vec<ReplicationStep> {
        self.steps.lock().await.clone()
    }

    async fn record(&self, step: ReplicationStep) {
        debug!(step = %step, "Replication step");
        self.steps.lock().await.push(step);
    }
}

#[async_trait]
impl ReplicationAgent for RecordingReplicationAgent {
    async fn setup_done(&self) -> Result<bool> {
        Ok(*self.done.lock().await)
    }

    async fn start_primary(&self) -> Result<()> {
        self.record(ReplicationStep::StartPrimary).await;
        Ok(())
    }

    async fn ensure_replica_user(&self, user: &str, _password: &str) -> Result<()> {
        self.record(ReplicationStep::EnsureReplicaUser(user.to_string()))
            .await;
        Ok(())
    }

    async fn clone_from(&self, source: &ReplicaSource) -> Result<()> {
        self.record(ReplicationStep::CloneFrom(source.address.clone()))
            .await;
        Ok(())
    }

    async fn stop_primary(&self) -> Result<()> {
        self.record(ReplicationStep::StopPrimary).await;
        Ok(())
    }

    async fn mark_setup_done(&self) -> Result<()> {
        self.record(ReplicationStep::MarkDone).await;
        *self.done.lock().await = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_coordination::{BarrierConfig, InMemoryCoordinationStore};
    use keel_types::{ClusterId, NodeId};
    use std::sync::Arc;
    use std::time::Duration;

    fn member(node: &str) -> ClusterMember {
        ClusterMember {
            node: NodeId::new(node),
            cluster: ClusterId::new("data"),
            founder: NodeId::new("a"),
            members: vec![NodeId::new("a"), NodeId::new("b")],
        }
    }

    fn source() -> ReplicaSource {
        ReplicaSource {
            address: "10.0.0.1".to_string(),
            port: 5432,
            user: "replica".to_string(),
            password: "pw".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_founder_and_standby_sequences() {
        let barrier = SyncBarrier::new(
            Arc::new(InMemoryCoordinationStore::new()),
            BarrierConfig {
                poll_interval: Duration::from_millis(100),
                timeout: Some(Duration::from_secs(60)),
            },
        );
        let founder_agent = RecordingReplicationAgent::new();
        let standby_agent = RecordingReplicationAgent::new();
        let (a, b) = (member("a"), member("b"));

        let source_a = source();
        let source_b = source();
        let (left, right) = tokio::join!(
            setup_streaming_replication(&a, &barrier, &founder_agent, &source_a, 3),
            setup_streaming_replication(&b, &barrier, &standby_agent, &source_b, 3),
        );
        left.unwrap();
        right.unwrap();

        assert_eq!(
            founder_agent.steps().await,
            vec![
                ReplicationStep::StartPrimary,
                ReplicationStep::EnsureReplicaUser("replica".to_string()),
                ReplicationStep::StopPrimary,
                ReplicationStep::MarkDone,
            ]
        );
        assert_eq!(
            standby_agent.steps().await,
            vec![
                ReplicationStep::CloneFrom("10.0.0.1".to_string()),
                ReplicationStep::MarkDone,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_nodes_only_pass_marks() {
        let barrier = SyncBarrier::new(
            Arc::new(InMemoryCoordinationStore::new()),
            BarrierConfig::default(),
        );
        let agent = RecordingReplicationAgent::new();
        agent.mark_setup_done().await.unwrap();
        let alone = ClusterMember {
            members: vec![NodeId::new("a")],
            ..member("a")
        };

        setup_streaming_replication(&alone, &barrier, &agent, &source(), 1)
            .await
            .unwrap();
        assert_eq!(agent.steps().await, vec![ReplicationStep::MarkDone]);
    }
}
