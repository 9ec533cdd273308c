//! Delegation configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How founders are delegated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Synthetic role added to founders
    pub role: String,

    /// Run-list priority of the delegate role
    pub priority: i32,

    /// Run-list state of the delegate role
    pub state: String,

    /// Convergence command run on each founder
    pub command: String,

    /// Directory receiving one `<node>.log` per founder
    pub log_dir: PathBuf,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            role: "compute-ha".to_string(),
            priority: 100,
            state: "all".to_string(),
            command: "keel-converge".to_string(),
            log_dir: PathBuf::from("/var/log/keel/delegation"),
        }
    }
}

impl DelegationConfig {
    /// Marker role left on founders whose delegate role is being removed
    pub fn remove_role(&self) -> String {
        format!("{}_remove", self.role)
    }

    pub fn log_file(&self, node: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", node))
    }
}
