//! Deployment elements
//!
//! An element is what an intent document lists under a role: a bare node,
//! a whole cluster (`cluster:<name>`), or only the remote members of a
//! cluster (`remotes:<name>`).

use crate::error::TypesError;
use crate::ids::{ClusterId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const CLUSTER_PREFIX: &str = "cluster:";
const REMOTES_PREFIX: &str = "remotes:";

/// A role assignment target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Element {
    /// A single node
    Node(NodeId),
    /// The core members of a cluster
    Cluster(ClusterId),
    /// The remote (extended) members of a cluster
    Remotes(ClusterId),
}

impl Element {
    pub fn node(id: impl Into<String>) -> Self {
        Element::Node(NodeId::new(id))
    }

    pub fn cluster(id: impl Into<String>) -> Self {
        Element::Cluster(ClusterId::new(id))
    }

    pub fn remotes(id: impl Into<String>) -> Self {
        Element::Remotes(ClusterId::new(id))
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Element::Cluster(_))
    }

    pub fn is_remotes(&self) -> bool {
        matches!(self, Element::Remotes(_))
    }

    /// Cluster backing this element, if any
    pub fn cluster_id(&self) -> Option<&ClusterId> {
        match self {
            Element::Cluster(c) | Element::Remotes(c) => Some(c),
            Element::Node(_) => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Node(n) => write!(f, "{}", n),
            Element::Cluster(c) => write!(f, "{}{}", CLUSTER_PREFIX, c),
            Element::Remotes(c) => write!(f, "{}{}", REMOTES_PREFIX, c),
        }
    }
}

impl FromStr for Element {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some(name) = s.strip_prefix(CLUSTER_PREFIX) {
            Element::cluster(name)
        } else if let Some(name) = s.strip_prefix(REMOTES_PREFIX) {
            Element::remotes(name)
        } else {
            Element::node(s)
        };

        let empty = match &parsed {
            Element::Node(n) => n.as_str().is_empty(),
            Element::Cluster(c) | Element::Remotes(c) => c.as_str().is_empty(),
        };
        if empty || s.chars().any(char::is_whitespace) {
            return Err(TypesError::InvalidElement(s.to_string()));
        }
        Ok(parsed)
    }
}

impl TryFrom<String> for Element {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Element> for String {
    fn from(e: Element) -> Self {
        e.to_string()
    }
}

/// Mapping from role name to its ordered list of elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Elements(BTreeMap<String, Vec<Element>>);

impl Elements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements for a role (empty when the role is absent)
    pub fn get(&self, role: &str) -> &[Element] {
        self.0.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.0.contains_key(role)
    }

    pub fn set(&mut self, role: impl Into<String>, elements: Vec<Element>) {
        self.0.insert(role.into(), elements);
    }

    pub fn with(mut self, role: impl Into<String>, elements: Vec<Element>) -> Self {
        self.set(role, elements);
        self
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Element])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

impl FromIterator<(String, Vec<Element>)> for Elements {
    fn from_iter<T: IntoIterator<Item = (String, Vec<Element>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
