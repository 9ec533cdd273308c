//! Streaming replication tuning and listen addresses

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Replication settings derived from the number of database nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationTuning {
    pub replica_user: String,
    pub hot_standby: String,
    pub hot_standby_feedback: String,
    pub max_replication_slots: usize,
    pub wal_keep_segments: u32,
    pub max_wal_senders: usize,
    pub wal_level: String,
}

impl ReplicationTuning {
    /// Settings for a cluster of `members` database nodes
    ///
    /// `max_wal_senders` is one and a half times the member count, rounded
    /// down: slightly above the number of expected standbys.
    pub fn for_members(members: usize) -> Self {
        Self {
            replica_user: "replica".to_string(),
            hot_standby: "on".to_string(),
            hot_standby_feedback: "on".to_string(),
            max_replication_slots: members,
            wal_keep_segments: 10,
            max_wal_senders: members * 3 / 2,
            wal_level: "hot_standby".to_string(),
        }
    }

    /// Entries for the server's `config` attribute block
    pub fn config_entries(&self) -> Value {
        json!({
            "hot_standby": self.hot_standby,
            "hot_standby_feedback": self.hot_standby_feedback,
            "max_replication_slots": self.max_replication_slots,
            "wal_keep_segments": self.wal_keep_segments,
            "max_wal_senders": self.max_wal_senders,
            "wal_level": self.wal_level,
        })
    }
}

/// Addresses the database server listens on
///
/// HA servers listen on the VIP, plus their own address when streaming
/// replication needs standbys to reach them directly.
pub fn listen_addresses(
    ha_enabled: bool,
    streaming_replication: bool,
    vip: Option<&str>,
    node_address: &str,
) -> Vec<String> {
    match (ha_enabled, vip) {
        (true, Some(vip)) if streaming_replication => {
            vec![vip.to_string(), node_address.to_string()]
        }
        (true, Some(vip)) => vec![vip.to_string()],
        _ => vec![node_address.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_members() {
        let tuning = ReplicationTuning::for_members(3);
        assert_eq!(tuning.max_replication_slots, 3);
        assert_eq!(tuning.max_wal_senders, 4);
        assert_eq!(tuning.wal_keep_segments, 10);
        assert_eq!(tuning.wal_level, "hot_standby");

        let config = tuning.config_entries();
        assert_eq!(config["max_wal_senders"], 4);
        assert_eq!(config["hot_standby"], "on");
    }

    #[test]
    fn test_wal_senders_round_down() {
        assert_eq!(ReplicationTuning::for_members(1).max_wal_senders, 1);
        assert_eq!(ReplicationTuning::for_members(2).max_wal_senders, 3);
        assert_eq!(ReplicationTuning::for_members(5).max_wal_senders, 7);
    }

    #[test]
    fn test_listen_addresses() {
        assert_eq!(
            listen_addresses(true, true, Some("10.0.0.10"), "10.0.0.2"),
            vec!["10.0.0.10", "10.0.0.2"]
        );
        assert_eq!(
            listen_addresses(true, false, Some("10.0.0.10"), "10.0.0.2"),
            vec!["10.0.0.10"]
        );
        assert_eq!(listen_addresses(false, true, None, "10.0.0.2"), vec!["10.0.0.2"]);
    }
}
