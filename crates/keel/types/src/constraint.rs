//! Role constraint tables
//!
//! Every service declares, per role, how many elements the role takes,
//! whether it accepts clusters or remote members, whether the admin server
//! may be used, and which platforms are allowed or excluded.

use crate::platform::PlatformRules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of elements a role resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Cardinality {
    /// At most this many elements
    AtMost(u32),
    /// Any number of elements (`-1` in constraint tables)
    Unbounded,
}

impl Cardinality {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Cardinality::AtMost(n) => count <= *n as usize,
            Cardinality::Unbounded => true,
        }
    }
}

impl TryFrom<i64> for Cardinality {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Cardinality::Unbounded),
            n if n >= 0 && n <= u32::MAX as i64 => Ok(Cardinality::AtMost(n as u32)),
            n => Err(format!("invalid role count {}", n)),
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(c: Cardinality) -> Self {
        match c {
            Cardinality::AtMost(n) => n as i64,
            Cardinality::Unbounded => -1,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::AtMost(n) => write!(f, "at most {}", n),
            Cardinality::Unbounded => write!(f, "any"),
        }
    }
}

/// Constraints on a single role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConstraint {
    /// Elements may not be shared with any other role of the proposal
    #[serde(default)]
    pub unique: bool,

    pub count: Cardinality,

    /// Role accepts `cluster:<name>` elements
    #[serde(default)]
    pub cluster: bool,

    /// Role accepts `remotes:<cluster>` elements
    #[serde(default)]
    pub remotes: bool,

    /// Whether the administrative server may take this role
    #[serde(default = "default_admin")]
    pub admin: bool,

    /// When non-empty, nodes must match one of these
    #[serde(default)]
    pub platform: PlatformRules,

    /// Nodes matching any of these are rejected
    #[serde(default)]
    pub exclude_platform: PlatformRules,
}

fn default_admin() -> bool {
    true
}

impl RoleConstraint {
    pub fn new(count: Cardinality) -> Self {
        Self {
            unique: false,
            count,
            cluster: false,
            remotes: false,
            admin: true,
            platform: PlatformRules::new(),
            exclude_platform: PlatformRules::new(),
        }
    }

    pub fn clustered(mut self) -> Self {
        self.cluster = true;
        self
    }

    pub fn accepting_remotes(mut self) -> Self {
        self.remotes = true;
        self
    }

    pub fn without_admin(mut self) -> Self {
        self.admin = false;
        self
    }

    pub fn with_platform(mut self, rules: PlatformRules) -> Self {
        self.platform = rules;
        self
    }

    pub fn excluding_platform(mut self, rules: PlatformRules) -> Self {
        self.exclude_platform = rules;
        self
    }
}

/// Role name → constraint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleConstraints(BTreeMap<String, RoleConstraint>);

impl RoleConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: impl Into<String>, constraint: RoleConstraint) -> Self {
        self.0.insert(role.into(), constraint);
        self
    }

    pub fn get(&self, role: &str) -> Option<&RoleConstraint> {
        self.0.get(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleConstraint)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Roles that accept `remotes:<cluster>` elements
    pub fn roles_with_remotes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, c)| c.remotes).map(|(r, _)| r)
    }
}
