//! Per-node run-lists

use serde::{Deserialize, Serialize};

/// A role scheduled on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunListEntry {
    pub role: String,
    pub priority: i32,
    pub state: String,
}

impl RunListEntry {
    pub fn new(role: impl Into<String>, priority: i32, state: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            priority,
            state: state.into(),
        }
    }
}

/// Ordered run-list, kept sorted by priority (stable for equal priorities)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunList(Vec<RunListEntry>);

impl RunList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|e| e.role == role)
    }

    /// Add a role; returns false if it was already present
    pub fn add(&mut self, role: impl Into<String>, priority: i32, state: impl Into<String>) -> bool {
        let role = role.into();
        if self.contains(&role) {
            return false;
        }
        let pos = self
            .0
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.0.len());
        self.0.insert(pos, RunListEntry::new(role, priority, state));
        true
    }

    /// Remove a role; returns false if it was absent
    pub fn remove(&mut self, role: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|e| e.role != role);
        before != self.0.len()
    }

    pub fn entries(&self) -> &[RunListEntry] {
        &self.0
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_list_ordering() {
        let mut rl = RunList::new();
        assert!(rl.add("database-server", 20, "all"));
        assert!(rl.add("pacemaker-cluster-member", 10, "all"));
        assert!(rl.add("compute-ha", 20, "all"));
        assert!(!rl.add("compute-ha", 5, "all"));

        let roles: Vec<_> = rl.roles().collect();
        assert_eq!(
            roles,
            vec!["pacemaker-cluster-member", "database-server", "compute-ha"]
        );

        assert!(rl.remove("compute-ha"));
        assert!(!rl.remove("compute-ha"));
        assert!(!rl.contains("compute-ha"));
    }
}
