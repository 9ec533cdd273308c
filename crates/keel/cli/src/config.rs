//! Configuration for the keel CLI

use keel_commit::ReadinessConfig;
use keel_coordination::BarrierConfig;
use keel_delegation::DelegationConfig;
use keel_plan::IsolationMode;
use serde::{Deserialize, Serialize};

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeelConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sync mark polling
    #[serde(default)]
    pub barrier: BarrierConfig,

    /// Post-commit readiness wait
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Remote delegation to cluster founders
    #[serde(default)]
    pub delegation: DelegationConfig,

    /// Deployment-wide cluster settings
    #[serde(default)]
    pub cluster: ClusterConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Settings shared by every cluster of the deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Domain virtual hostnames are qualified with
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Isolation mode for remote members
    #[serde(default = "default_stonith_mode")]
    pub stonith_mode: IsolationMode,

    /// Whether Hyper-V compute nodes can be deployed
    #[serde(default)]
    pub hypervisor_support: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            stonith_mode: default_stonith_mode(),
            hypervisor_support: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_domain() -> String {
    "cloud.local".to_string()
}

fn default_stonith_mode() -> IsolationMode {
    IsolationMode::Manual
}

impl KeelConfig {
    /// Defaults, then the optional file, then `KEEL_` environment variables
    ///
    /// Nested keys use a double underscore: `KEEL_CLUSTER__DOMAIN`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&KeelConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KEEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = KeelConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.cluster.stonith_mode, IsolationMode::Manual);
        assert!(!config.cluster.hypervisor_support);
        assert_eq!(config.delegation.role, "compute-ha");
        assert!(config.barrier.timeout.is_none());
    }

    #[test]
    fn test_load_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "cluster:\n  domain: cloud.example.com\n  stonith_mode: per_node\nbarrier:\n  poll_interval: 5\n  timeout: 600\n"
        )
        .unwrap();

        let config = KeelConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.cluster.domain, "cloud.example.com");
        assert_eq!(config.cluster.stonith_mode, IsolationMode::PerNode);
        assert_eq!(config.barrier.poll_interval, Duration::from_secs(5));
        assert_eq!(config.barrier.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.readiness, ReadinessConfig::default());
    }
}
