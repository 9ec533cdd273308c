//! HA resource objects and transactions
//!
//! The subset of a cluster resource manager's object model keel builds:
//! primitives, groups, clones, multi-state resources and the location,
//! colocation and order constraints that tie them together.

use crate::error::{Result, TypesError};
use crate::ids::TransactionId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Interval/timeout settings for one resource operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl OpSpec {
    pub fn timeout(timeout: impl Into<String>) -> Self {
        Self {
            interval: None,
            timeout: Some(timeout.into()),
        }
    }

    pub fn interval(interval: impl Into<String>) -> Self {
        Self {
            interval: Some(interval.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}

/// Operation name (`start`, `monitor`, ...) → settings
pub type Operations = BTreeMap<String, OpSpec>;

/// Object payload, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Primitive {
        id: String,
        agent: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
        #[serde(default)]
        ops: Operations,
        #[serde(default)]
        meta: BTreeMap<String, String>,
    },
    Group {
        id: String,
        members: Vec<String>,
    },
    Clone {
        id: String,
        target: String,
        #[serde(default)]
        meta: BTreeMap<String, String>,
    },
    MultiState {
        id: String,
        target: String,
        #[serde(default)]
        meta: BTreeMap<String, String>,
    },
    Location {
        id: String,
        definition: String,
    },
    Colocation {
        id: String,
        score: String,
        resources: Vec<String>,
    },
    Order {
        id: String,
        score: String,
        ordering: String,
    },
}

/// Kind of a resource object, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Primitive,
    Group,
    Clone,
    MultiState,
    Location,
    Colocation,
    Order,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Primitive => "primitive",
            ResourceKind::Group => "group",
            ResourceKind::Clone => "clone",
            ResourceKind::MultiState => "ms",
            ResourceKind::Location => "location",
            ResourceKind::Colocation => "colocation",
            ResourceKind::Order => "order",
        };
        f.write_str(s)
    }
}

impl ResourceSpec {
    pub fn id(&self) -> &str {
        match self {
            ResourceSpec::Primitive { id, .. }
            | ResourceSpec::Group { id, .. }
            | ResourceSpec::Clone { id, .. }
            | ResourceSpec::MultiState { id, .. }
            | ResourceSpec::Location { id, .. }
            | ResourceSpec::Colocation { id, .. }
            | ResourceSpec::Order { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Primitive { .. } => ResourceKind::Primitive,
            ResourceSpec::Group { .. } => ResourceKind::Group,
            ResourceSpec::Clone { .. } => ResourceKind::Clone,
            ResourceSpec::MultiState { .. } => ResourceKind::MultiState,
            ResourceSpec::Location { .. } => ResourceKind::Location,
            ResourceSpec::Colocation { .. } => ResourceKind::Colocation,
            ResourceSpec::Order { .. } => ResourceKind::Order,
        }
    }
}

/// A resource object plus the founder-only guard flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    #[serde(flatten)]
    pub spec: ResourceSpec,

    /// Only the cluster founder may apply this definition
    #[serde(default = "default_founder_only")]
    pub founder_only: bool,
}

fn default_founder_only() -> bool {
    true
}

impl ResourceDefinition {
    /// Founder-only definition
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            spec,
            founder_only: true,
        }
    }

    pub fn id(&self) -> &str {
        self.spec.id()
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Reference used in transaction listings: `primitive[vip-admin-db]`
    pub fn reference(&self) -> String {
        format!("{}[{}]", self.kind(), self.id())
    }
}

/// Ordered resource objects committed as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Human readable name (`database service`)
    pub name: String,

    pub objects: Vec<ResourceDefinition>,
}

impl Transaction {
    /// Build a transaction; ids must be unique and the list non-empty
    pub fn new(name: impl Into<String>, objects: Vec<ResourceDefinition>) -> Result<Self> {
        let name = name.into();
        if objects.is_empty() {
            return Err(TypesError::EmptyTransaction(name));
        }

        let mut seen = HashSet::new();
        for object in &objects {
            if !seen.insert(object.id()) {
                return Err(TypesError::DuplicateResource {
                    transaction: name,
                    id: object.id().to_string(),
                });
            }
        }

        Ok(Self {
            id: TransactionId::generate(),
            name,
            objects,
        })
    }

    pub fn references(&self) -> Vec<String> {
        self.objects.iter().map(ResourceDefinition::reference).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(ResourceDefinition::id)
    }

    /// True when every object carries the founder-only guard
    pub fn founder_only(&self) -> bool {
        self.objects.iter().all(|o| o.founder_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str) -> ResourceDefinition {
        ResourceDefinition::new(ResourceSpec::Location {
            id: id.into(),
            definition: format!("location {} x rule 0: role eq controller", id),
        })
    }

    #[test]
    fn test_transaction_rejects_duplicates_and_empty() {
        assert!(matches!(
            Transaction::new("empty", vec![]),
            Err(TypesError::EmptyTransaction(_))
        ));
        assert!(matches!(
            Transaction::new("dup", vec![location("l-a"), location("l-a")]),
            Err(TypesError::DuplicateResource { .. })
        ));

        let tx = Transaction::new("ok", vec![location("l-a"), location("l-b")]).unwrap();
        assert_eq!(tx.references(), vec!["location[l-a]", "location[l-b]"]);
        assert!(tx.founder_only());
    }

    #[test]
    fn test_definition_serializes_flat() {
        let def = ResourceDefinition::new(ResourceSpec::Order {
            id: "o-promote-ms-postgresql".into(),
            score: "Mandatory".into(),
            ordering: "ms-postgresql:promote vip:start symmetrical=false".into(),
        });
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["kind"], "order");
        assert_eq!(json["id"], "o-promote-ms-postgresql");
        assert_eq!(json["founder_only"], true);

        let back: ResourceDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }
}
