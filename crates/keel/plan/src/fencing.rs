//! Fencing topology for remote members
//!
//! Each remote member gets one topology level: the isolation resource
//! selected by the cluster's isolation mode, chained with the service's own
//! fence primitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// How failed nodes are isolated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IsolationMode {
    Disabled,
    /// Operator fences by hand; no topology is configured
    Manual,
    /// One shared device for every node (`stonith-shared`)
    Shared,
    /// Storage-based death (`stonith-sbd`)
    Sbd,
    /// One device per node (`stonith-remote-<member>`)
    PerNode,
    /// A named, operator-provided resource
    Custom(String),
}

impl IsolationMode {
    /// Parse a mode name, taking the resource of a `custom` mode separately
    pub fn parse(mode: &str, custom_resource: Option<&str>) -> Result<Self> {
        match mode {
            "disabled" => Ok(IsolationMode::Disabled),
            "manual" => Ok(IsolationMode::Manual),
            "shared" => Ok(IsolationMode::Shared),
            "sbd" => Ok(IsolationMode::Sbd),
            "per_node" => Ok(IsolationMode::PerNode),
            "custom" => match custom_resource {
                Some(resource) if !resource.is_empty() => {
                    Ok(IsolationMode::Custom(resource.to_string()))
                }
                _ => Err(PlanError::MissingIsolationResource),
            },
            other => Err(PlanError::UnknownIsolationMode(other.to_string())),
        }
    }

    /// Isolation resource of a member, or none when fencing is not managed
    pub fn resource_for(&self, member: &str) -> Option<String> {
        match self {
            IsolationMode::Disabled | IsolationMode::Manual => None,
            IsolationMode::Shared => Some("stonith-shared".to_string()),
            IsolationMode::Sbd => Some("stonith-sbd".to_string()),
            IsolationMode::PerNode => Some(format!("stonith-remote-{}", member)),
            IsolationMode::Custom(resource) => Some(resource.clone()),
        }
    }
}

impl FromStr for IsolationMode {
    type Err = PlanError;

    /// Accepts `custom:<resource>` for custom modes
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("custom", resource)) => Self::parse("custom", Some(resource)),
            _ => Self::parse(s, None),
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Disabled => f.write_str("disabled"),
            IsolationMode::Manual => f.write_str("manual"),
            IsolationMode::Shared => f.write_str("shared"),
            IsolationMode::Sbd => f.write_str("sbd"),
            IsolationMode::PerNode => f.write_str("per_node"),
            IsolationMode::Custom(resource) => write!(f, "custom:{}", resource),
        }
    }
}

impl TryFrom<String> for IsolationMode {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IsolationMode> for String {
    fn from(mode: IsolationMode) -> Self {
        mode.to_string()
    }
}

/// One topology level per remote member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FencingLevel {
    pub member: String,
    pub devices: Vec<String>,
}

impl fmt::Display for FencingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote-{}: {}", self.member, self.devices.join(","))
    }
}

/// Fencing topology of a cluster's remote members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FencingTopology {
    pub levels: Vec<FencingLevel>,
}

impl FencingTopology {
    /// `remote-<member>: <devices>` lines
    pub fn lines(&self) -> Vec<String> {
        self.levels.iter().map(ToString::to_string).collect()
    }

    /// Resource manager command loading the topology
    pub fn render(&self) -> String {
        format!("fencing_topology {}", self.lines().join(" "))
    }
}

/// Fencing topology for `members` under `mode`
///
/// Returns `None` when the mode leaves fencing unmanaged or there are no
/// remote members.
pub fn fencing_topology(
    mode: &IsolationMode,
    members: &[String],
    fence_primitive: Option<&str>,
) -> Option<FencingTopology> {
    if members.is_empty() {
        return None;
    }

    let levels = members
        .iter()
        .map(|member| {
            mode.resource_for(member).map(|resource| FencingLevel {
                member: member.clone(),
                devices: std::iter::once(resource)
                    .chain(fence_primitive.map(str::to_string))
                    .collect(),
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(FencingTopology { levels })
}
