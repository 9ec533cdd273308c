//! Synchronization marks
//!
//! Marks are named `<phase>-<subsystem>_<purpose>`. The phase decides who
//! posts and who waits; the mark itself (subsystem, purpose and optional
//! revision) is the rendezvous key shared by all phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a node takes part in a mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Non-founders wait for the founder's post; the founder passes through
    Wait,
    /// The founder posts; non-founders pass through
    Create,
    /// Every member posts, then waits for all members
    Sync,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Wait => f.write_str("wait"),
            SyncPhase::Create => f.write_str("create"),
            SyncPhase::Sync => f.write_str("sync"),
        }
    }
}

impl FromStr for SyncPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(SyncPhase::Wait),
            "create" => Ok(SyncPhase::Create),
            "sync" => Ok(SyncPhase::Sync),
            other => Err(format!("unknown sync phase {:?}", other)),
        }
    }
}

/// A named, optionally revisioned barrier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncMark {
    pub subsystem: String,
    pub purpose: String,
    #[serde(default)]
    pub revision: Option<u64>,
}

impl SyncMark {
    pub fn new(subsystem: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            purpose: purpose.into(),
            revision: None,
        }
    }

    /// Tie the mark to a role revision so re-applies never match a stale post
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Rendezvous key shared by every phase of this mark
    pub fn key(&self) -> String {
        match self.revision {
            Some(rev) => format!("{}_{}-{}", self.subsystem, self.purpose, rev),
            None => format!("{}_{}", self.subsystem, self.purpose),
        }
    }

    /// Full mark name for a phase: `sync-database_before_ha`
    pub fn name(&self, phase: SyncPhase) -> String {
        format!("{}-{}_{}", phase, self.subsystem, self.purpose)
    }

    /// Split a full mark name into phase and mark
    pub fn parse(name: &str) -> Option<(SyncPhase, SyncMark)> {
        let (phase, rest) = name.split_once('-')?;
        let phase = phase.parse().ok()?;
        let (subsystem, purpose) = rest.split_once('_')?;
        if subsystem.is_empty() || purpose.is_empty() {
            return None;
        }
        Some((phase, SyncMark::new(subsystem, purpose)))
    }
}

impl fmt::Display for SyncMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_naming() {
        let mark = SyncMark::new("database", "ha_resources");
        assert_eq!(mark.name(SyncPhase::Wait), "wait-database_ha_resources");
        assert_eq!(mark.name(SyncPhase::Create), "create-database_ha_resources");
        assert_eq!(mark.key(), "database_ha_resources");
        assert_eq!(mark.with_revision(7).key(), "database_ha_resources-7");
    }

    #[test]
    fn test_mark_parse() {
        let (phase, mark) = SyncMark::parse("sync-nova_compute_before_ha").unwrap();
        assert_eq!(phase, SyncPhase::Sync);
        assert_eq!(mark.subsystem, "nova");
        assert_eq!(mark.purpose, "compute_before_ha");

        assert!(SyncMark::parse("later-database_x").is_none());
        assert!(SyncMark::parse("sync-database").is_none());
    }
}
