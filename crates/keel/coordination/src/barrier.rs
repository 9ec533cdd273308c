//! Synchronization Barrier Protocol
//!
//! `post` records that a node reached a mark; `wait` blocks until every
//! peer in a set has posted the same mark key, polling the coordination
//! store at a bounded interval. Work gated behind a mark therefore observes
//! everything each peer did before posting it.
//!
//! Waits are unbounded unless a timeout is configured or passed explicitly;
//! expiry is a fatal error for the caller.

use std::sync::Arc;
use std::time::Duration;

use keel_types::{NodeId, SyncMark, SyncPhase};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoordinationError, Result};
use crate::store::CoordinationStore;

/// Barrier polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// Interval between two reads of the coordination store
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Deadline applied to every `wait`; none means unbounded
    #[serde(default, with = "option_duration_secs")]
    pub timeout: Option<Duration>,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// What a node did at a mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Posted,
    Waited,
    PostedAndWaited,
    /// The phase does not involve this node
    PassedThrough,
}

/// Cross-node rendezvous over a coordination store
#[derive(Clone)]
pub struct SyncBarrier {
    store: Arc<dyn CoordinationStore>,
    config: BarrierConfig,
}

impl SyncBarrier {
    pub fn new(store: Arc<dyn CoordinationStore>, config: BarrierConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    #[instrument(skip(self), fields(mark = %mark))]
    pub async fn post(&self, node: &NodeId, mark: &SyncMark) -> Result<()> {
        self.store.post(node, &mark.key()).await?;
        debug!(node = %node, "Mark posted");
        Ok(())
    }

    /// Peers that have not yet posted the mark
    pub async fn missing(&self, mark: &SyncMark, peers: &[NodeId]) -> Result<Vec<NodeId>> {
        let posted = self.store.posted(&mark.key()).await?;
        Ok(peers
            .iter()
            .filter(|p| !posted.contains(p))
            .cloned()
            .collect())
    }

    /// Block until every peer has posted, within the configured timeout
    pub async fn wait(&self, mark: &SyncMark, peers: &[NodeId]) -> Result<()> {
        self.wait_until(mark, peers, self.config.timeout).await
    }

    /// Block until every peer has posted, failing after `timeout`
    pub async fn wait_for(&self, mark: &SyncMark, peers: &[NodeId], timeout: Duration) -> Result<()> {
        self.wait_until(mark, peers, Some(timeout)).await
    }

    #[instrument(skip(self, peers), fields(mark = %mark, peers = peers.len()))]
    async fn wait_until(
        &self,
        mark: &SyncMark,
        peers: &[NodeId],
        timeout: Option<Duration>,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);

        loop {
            let missing = self.missing(mark, peers).await?;
            if missing.is_empty() {
                debug!(waited = ?started.elapsed(), "Mark reached by all peers");
                return Ok(());
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(missing = missing.len(), "Timed out waiting for mark");
                    return Err(CoordinationError::BarrierTimeout {
                        mark: mark.key(),
                        waited: started.elapsed(),
                        missing,
                    });
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Take part in a phased mark
    ///
    /// - `Wait`: non-founders wait for the founder's post; the founder passes.
    /// - `Create`: the founder posts; non-founders pass.
    /// - `Sync`: every member posts, then waits for all members.
    #[instrument(skip(self, members), fields(mark = %mark.name(phase)))]
    pub async fn mark(
        &self,
        phase: SyncPhase,
        mark: &SyncMark,
        node: &NodeId,
        founder: &NodeId,
        members: &[NodeId],
    ) -> Result<MarkOutcome> {
        let is_founder = node == founder;
        let outcome = match (phase, is_founder) {
            (SyncPhase::Wait, true) | (SyncPhase::Create, false) => MarkOutcome::PassedThrough,
            (SyncPhase::Wait, false) => {
                self.wait(mark, std::slice::from_ref(founder)).await?;
                MarkOutcome::Waited
            }
            (SyncPhase::Create, true) => {
                self.post(node, mark).await?;
                MarkOutcome::Posted
            }
            (SyncPhase::Sync, _) => {
                self.post(node, mark).await?;
                self.wait(mark, members).await?;
                MarkOutcome::PostedAndWaited
            }
        };
        debug!(node = %node, outcome = ?outcome, "Mark handled");
        Ok(outcome)
    }

    /// Forget every mark a node posted, before a fresh apply
    pub async fn reset(&self, node: &NodeId) -> Result<()> {
        self.store.reset(node).await?;
        info!(node = %node, "Sync marks reset");
        Ok(())
    }
}

impl std::fmt::Debug for SyncBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBarrier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCoordinationStore;

    fn barrier(timeout: Option<Duration>) -> SyncBarrier {
        SyncBarrier::new(
            Arc::new(InMemoryCoordinationStore::new()),
            BarrierConfig {
                poll_interval: Duration::from_millis(10),
                timeout,
            },
        )
    }

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_once_all_posted() {
        let barrier = barrier(None);
        let mark = SyncMark::new("database", "ha_resources");
        let peers = ids(&["a", "b"]);

        let waiter = {
            let barrier = barrier.clone();
            let mark = mark.clone();
            let peers = peers.clone();
            tokio::spawn(async move { barrier.wait(&mark, &peers).await })
        };

        barrier.post(&peers[0], &mark).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        barrier.post(&peers[1], &mark).await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_naming_missing_peers() {
        let barrier = barrier(Some(Duration::from_secs(1)));
        let mark = SyncMark::new("nova", "compute_ha_resources");
        barrier.post(&NodeId::new("a"), &mark).await.unwrap();

        let err = barrier.wait(&mark, &ids(&["a", "b"])).await.unwrap_err();
        match err {
            CoordinationError::BarrierTimeout { missing, .. } => {
                assert_eq!(missing, ids(&["b"]))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisioned_marks_do_not_match() {
        let barrier = barrier(Some(Duration::from_secs(1)));
        let old = SyncMark::new("database", "ha_resources").with_revision(3);
        let new = SyncMark::new("database", "ha_resources").with_revision(4);

        barrier.post(&NodeId::new("a"), &old).await.unwrap();
        assert!(barrier.wait(&new, &ids(&["a"])).await.is_err());
        assert!(barrier.wait(&old, &ids(&["a"])).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_phased_marks() {
        let barrier = barrier(Some(Duration::from_secs(5)));
        let mark = SyncMark::new("database", "ha_resources");
        let members = ids(&["a", "b"]);
        let founder = &members[0];

        // The founder passes a wait, a member passes a create
        assert_eq!(
            barrier
                .mark(SyncPhase::Wait, &mark, founder, founder, &members)
                .await
                .unwrap(),
            MarkOutcome::PassedThrough
        );
        assert_eq!(
            barrier
                .mark(SyncPhase::Create, &mark, &members[1], founder, &members)
                .await
                .unwrap(),
            MarkOutcome::PassedThrough
        );

        let member = {
            let barrier = barrier.clone();
            let mark = mark.clone();
            let members = members.clone();
            tokio::spawn(async move {
                barrier
                    .mark(SyncPhase::Wait, &mark, &members[1], &members[0], &members)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!member.is_finished());

        assert_eq!(
            barrier
                .mark(SyncPhase::Create, &mark, founder, founder, &members)
                .await
                .unwrap(),
            MarkOutcome::Posted
        );
        assert_eq!(member.await.unwrap().unwrap(), MarkOutcome::Waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_phase_needs_everyone() {
        let barrier = barrier(Some(Duration::from_secs(5)));
        let mark = SyncMark::new("nova", "compute_before_ha");
        let members = ids(&["a", "b", "c"]);

        let handles: Vec<_> = members
            .iter()
            .cloned()
            .map(|node| {
                let barrier = barrier.clone();
                let mark = mark.clone();
                let members = members.clone();
                tokio::spawn(async move {
                    barrier
                        .mark(SyncPhase::Sync, &mark, &node, &members[0], &members)
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), MarkOutcome::PostedAndWaited);
        }
    }

    #[test]
    fn test_config_from_seconds() {
        let config: BarrierConfig =
            serde_json::from_str(r#"{ "poll_interval": 0.5, "timeout": 30 }"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }
}
