//! Platform descriptors and platform include/exclude rules
//!
//! Role constraint tables restrict roles to (or away from) platforms with
//! rules such as `"suse" => "< 12.1"` or `"windows" => "/.*/"`. Version
//! rules are evaluated with `semver`; a bare version means an exact match.

use crate::error::{Result, TypesError};
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operating system descriptor of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Platform name (`suse`, `ubuntu`, `windows`, ...)
    pub name: String,

    /// Platform family (`suse`, `debian`, `rhel`, `windows`)
    #[serde(default)]
    pub family: String,

    /// Platform version, dotted (`12.2`)
    pub version: String,

    /// Kernel machine architecture (`x86_64`, `s390x`)
    #[serde(default = "default_arch")]
    pub arch: String,
}

fn default_arch() -> String {
    "x86_64".to_string()
}

impl Platform {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            family: name.clone(),
            name,
            version: version.into(),
            arch: default_arch(),
        }
    }

    /// Parse the dotted version, padding missing components with zero
    pub fn semver(&self) -> Result<Version> {
        parse_loose_version(&self.version)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

fn parse_loose_version(raw: &str) -> Result<Version> {
    let invalid = || TypesError::InvalidVersion(raw.to_string());
    let parts = raw
        .trim()
        .split('.')
        .map(|p| p.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<u64>>>()?;
    match parts.as_slice() {
        [major] => Ok(Version::new(*major, 0, 0)),
        [major, minor] => Ok(Version::new(*major, *minor, 0)),
        [major, minor, patch] => Ok(Version::new(*major, *minor, *patch)),
        _ => Err(invalid()),
    }
}

/// A single platform rule: a version requirement or a `/regex/` pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformRule {
    source: String,
    matcher: RuleMatcher,
}

#[derive(Debug, Clone)]
enum RuleMatcher {
    Version(VersionReq),
    Pattern(Regex),
}

impl PlatformRule {
    pub fn parse(rule: &str) -> Result<Self> {
        let trimmed = rule.trim();
        let matcher = if trimmed.len() >= 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            let pattern = &trimmed[1..trimmed.len() - 1];
            let regex = Regex::new(pattern).map_err(|e| TypesError::InvalidPlatformRule {
                rule: rule.to_string(),
                reason: e.to_string(),
            })?;
            RuleMatcher::Pattern(regex)
        } else {
            // A bare version is an exact match, not semver's caret default
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            let req = if compact.starts_with(|c: char| c.is_ascii_digit()) {
                format!("={}", compact)
            } else {
                compact
            };
            let req = VersionReq::parse(&req).map_err(|e| TypesError::InvalidPlatformRule {
                rule: rule.to_string(),
                reason: e.to_string(),
            })?;
            RuleMatcher::Version(req)
        };

        Ok(Self {
            source: rule.to_string(),
            matcher,
        })
    }

    /// Does this rule match the given platform version?
    pub fn matches(&self, version: &str) -> bool {
        match &self.matcher {
            RuleMatcher::Pattern(re) => re.is_match(version),
            RuleMatcher::Version(req) => parse_loose_version(version)
                .map(|v| req.matches(&v))
                .unwrap_or(false),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for PlatformRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for PlatformRule {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PlatformRule> for String {
    fn from(rule: PlatformRule) -> Self {
        rule.source
    }
}

/// Platform name → rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformRules(BTreeMap<String, PlatformRule>);

impl PlatformRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a platform
    pub fn with(mut self, platform: impl Into<String>, rule: &str) -> Result<Self> {
        self.0.insert(platform.into(), PlatformRule::parse(rule)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when some rule names this platform and matches its version
    pub fn matches(&self, platform: &Platform) -> bool {
        self.0
            .get(&platform.name)
            .map(|rule| rule.matches(&platform.version))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_rules() {
        let lt = PlatformRule::parse("< 12.1").unwrap();
        assert!(lt.matches("12"));
        assert!(lt.matches("11.4"));
        assert!(!lt.matches("12.1"));
        assert!(!lt.matches("12.3"));

        let exact = PlatformRule::parse("12.1").unwrap();
        assert!(exact.matches("12.1"));
        assert!(!exact.matches("12.2"));
    }

    #[test]
    fn test_pattern_rules() {
        let any = PlatformRule::parse("/.*/").unwrap();
        assert!(any.matches("2012r2"));
        assert!(any.matches("12.1"));
    }

    #[test]
    fn test_rules_by_platform() {
        let rules = PlatformRules::new()
            .with("suse", "< 12.1")
            .unwrap()
            .with("windows", "/.*/")
            .unwrap();

        assert!(rules.matches(&Platform::new("suse", "11.3")));
        assert!(!rules.matches(&Platform::new("suse", "12.2")));
        assert!(rules.matches(&Platform::new("windows", "2012")));
        assert!(!rules.matches(&Platform::new("ubuntu", "16.04")));
        assert_eq!(
            Platform::new("ubuntu", "16.04").semver().unwrap(),
            Version::new(16, 4, 0)
        );
    }

    #[test]
    fn test_invalid_rule() {
        assert!(PlatformRule::parse("/[/").is_err());
        assert!(PlatformRule::parse("<< 1").is_err());
    }
}
