//! Proposals and roles
//!
//! A Proposal is the operator's draft deployment intent. Once validated it
//! is promoted to a Role, which carries the final attributes and is what
//! per-node convergence reads. Attribute trees are plain JSON values,
//! addressed by key paths.

use crate::element::Elements;
use crate::ids::ProposalId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Draft deployment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default = "ProposalId::generate")]
    pub id: ProposalId,

    /// Service this proposal deploys (`database`, `compute`)
    pub service: String,

    /// Instance name (`default`)
    pub name: String,

    /// Service attribute tree
    #[serde(default = "empty_tree")]
    pub attributes: Value,

    /// Role name → elements
    #[serde(default)]
    pub elements: Elements,

    /// Bumped on every save
    #[serde(default)]
    pub revision: u64,

    #[serde(default = "chrono::Utc::now")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn empty_tree() -> Value {
    Value::Object(Map::new())
}

impl Proposal {
    pub fn new(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProposalId::generate(),
            service: service.into(),
            name: name.into(),
            attributes: Value::Object(Map::new()),
            elements: Elements::new(),
            revision: 0,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_elements(mut self, elements: Elements) -> Self {
        self.elements = elements;
        self
    }

    /// Name of the role this proposal is promoted to
    pub fn role_name(&self) -> String {
        format!("{}-config-{}", self.service, self.name)
    }

    pub fn attr(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.attributes, path)
    }
}

/// Realized form of a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// `<service>-config-<instance>`
    pub name: String,

    pub service: String,

    /// Attributes keyed by top-level namespace (`database`, `postgresql`, ...)
    pub default_attributes: Value,

    /// Attributes that win over node-level settings
    pub override_attributes: Value,

    pub elements: Elements,

    /// Run-list priority per element role
    #[serde(default)]
    pub element_run_list_order: BTreeMap<String, i32>,

    /// Node state in which each element role is active
    #[serde(default)]
    pub element_states: BTreeMap<String, String>,

    /// Copied from the proposal revision at promotion
    pub revision: u64,
}

impl Role {
    /// Promote a proposal
    pub fn from_proposal(proposal: &Proposal) -> Self {
        let mut default_attributes = Map::new();
        default_attributes.insert(proposal.service.clone(), proposal.attributes.clone());
        Self {
            name: proposal.role_name(),
            service: proposal.service.clone(),
            default_attributes: Value::Object(default_attributes),
            override_attributes: Value::Object(Map::new()),
            elements: proposal.elements.clone(),
            element_run_list_order: BTreeMap::new(),
            element_states: BTreeMap::new(),
            revision: proposal.revision,
        }
    }

    pub fn default_attr(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.default_attributes, path)
    }

    pub fn override_attr(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.override_attributes, path)
    }

    /// Returns a copy with a default attribute set
    pub fn with_default_attr(mut self, path: &[&str], value: Value) -> Self {
        assign(&mut self.default_attributes, path, value);
        self
    }

    /// Returns a copy with an override attribute set
    pub fn with_override_attr(mut self, path: &[&str], value: Value) -> Self {
        assign(&mut self.override_attributes, path, value);
        self
    }

    pub fn with_elements(mut self, elements: Elements) -> Self {
        self.elements = elements;
        self
    }

    pub fn run_list_priority(&self, role: &str) -> i32 {
        self.element_run_list_order.get(role).copied().unwrap_or(0)
    }

    pub fn element_state(&self, role: &str) -> &str {
        self.element_states
            .get(role)
            .map(String::as_str)
            .unwrap_or("all")
    }
}

/// Follow a key path through nested objects
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |v, key| v.get(*key))
}

/// Set a value at a key path, creating intermediate objects
pub fn assign(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut cursor = root;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(last.to_string(), value);
    }
}
