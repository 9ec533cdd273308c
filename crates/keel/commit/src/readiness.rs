//! Post-commit readiness wait
//!
//! First the resource manager settles the resource, then a liveness probe
//! is polled until it succeeds. Both share one deadline; expiry asks for
//! manual intervention.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use keel_plan::ReadinessCheck;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::error::{CommitError, Result};
use crate::manager::ResourceManager;

/// Readiness wait settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Bound on the whole wait, in seconds
    pub timeout_secs: u64,

    /// Interval between liveness probes, in seconds
    pub probe_interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            probe_interval_secs: 2,
        }
    }
}

impl ReadinessConfig {
    /// The check with this config's bounds
    pub fn apply(&self, check: &ReadinessCheck) -> ReadinessCheck {
        ReadinessCheck {
            timeout: Duration::from_secs(self.timeout_secs),
            probe_interval: Duration::from_secs(self.probe_interval_secs),
            ..check.clone()
        }
    }
}

/// Basic liveness check against the running service
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Probe that succeeds when a command exits zero
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `psql -c 'select 1'` as the database superuser
    pub fn postgresql() -> Self {
        Self::new("su", ["postgres", "-c", "psql -c 'select 1'"])
    }
}

#[async_trait]
impl LivenessProbe for CommandProbe {
    async fn probe(&self) -> bool {
        match Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(program = %self.program, error = %e, "Probe could not run");
                false
            }
        }
    }
}

/// Wait until the resource is settled and the probe succeeds
#[instrument(skip(manager, probe), fields(resource = %check.resource))]
pub async fn wait_ready(
    manager: &dyn ResourceManager,
    probe: &dyn LivenessProbe,
    check: &ReadinessCheck,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + check.timeout;
    let expired = || {
        error!(waited = ?started.elapsed(), "{}", check.failure_message);
        CommitError::ManualInterventionRequired {
            resource: check.resource.clone(),
            message: check.failure_message.clone(),
        }
    };

    match tokio::time::timeout_at(deadline, manager.wait_for(&check.resource)).await {
        Ok(settled) => settled?,
        Err(_) => return Err(expired()),
    }
    debug!("Resource settled");

    loop {
        let alive = match tokio::time::timeout_at(deadline, probe.probe()).await {
            Ok(alive) => alive,
            Err(_) => return Err(expired()),
        };
        if alive {
            info!(waited = ?started.elapsed(), "Service ready");
            return Ok(());
        }
        if Instant::now() + check.probe_interval > deadline {
            return Err(expired());
        }
        tokio::time::sleep(check.probe_interval).await;
    }
}
