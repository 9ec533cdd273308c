//! Remote execution trigger
//!
//! Runs a convergence command on a target node and reports a structured
//! result. Output is appended to a per-node log file as well as returned.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use keel_types::NodeId;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;

/// Outcome of one triggered run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub node: NodeId,

    /// Exit code; none when the process was killed by a signal
    pub status: Option<i32>,

    pub duration: Duration,

    /// Combined stdout and stderr
    pub output: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Triggers convergence on a remote node
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, node: &NodeId, command: &str, log_file: &Path) -> Result<ExecutionResult>;
}

/// Runs commands over `ssh`
#[derive(Debug, Clone)]
pub struct SshExecutor {
    ssh: String,
    user: String,
    options: Vec<String>,
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self {
            ssh: "ssh".to_string(),
            user: "root".to_string(),
            options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
        }
    }
}

impl SshExecutor {
    pub fn new(ssh: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            ssh: ssh.into(),
            user: user.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    fn target(&self, node: &NodeId) -> String {
        if self.user.is_empty() {
            node.to_string()
        } else {
            format!("{}@{}", self.user, node)
        }
    }
}

async fn append_log(log_file: &Path, output: &str) -> std::io::Result<()> {
    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .await?;
    file.write_all(output.as_bytes()).await?;
    file.flush().await
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, node: &NodeId, command: &str, log_file: &Path) -> Result<ExecutionResult> {
        let started = Instant::now();
        debug!(node = %node, command = %command, "Triggering remote run");

        let output = Command::new(&self.ssh)
            .args(&self.options)
            .arg(self.target(node))
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        append_log(log_file, &combined).await?;

        let result = ExecutionResult {
            node: node.clone(),
            status: output.status.code(),
            duration: started.elapsed(),
            output: combined,
        };
        if !result.success() {
            warn!(node = %node, status = ?result.status, "Remote run failed");
        }
        Ok(result)
    }
}

/// Executor with pre-set exit codes, for tests and dry runs
///
/// Nodes without a scripted code succeed. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    exit_codes: DashMap<NodeId, i32>,
    delays: DashMap<NodeId, Duration>,
    calls: DashMap<NodeId, u32>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit_with(self, node: &NodeId, code: i32) -> Self {
        self.exit_codes.insert(node.clone(), code);
        self
    }

    pub fn delay(self, node: &NodeId, delay: Duration) -> Self {
        self.delays.insert(node.clone(), delay);
        self
    }

    pub fn set_exit_code(&self, node: &NodeId, code: i32) {
        self.exit_codes.insert(node.clone(), code);
    }

    pub fn calls(&self, node: &NodeId) -> u32 {
        self.calls.get(node).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, node: &NodeId, command: &str, log_file: &Path) -> Result<ExecutionResult> {
        let started = Instant::now();
        *self.calls.entry(node.clone()).or_insert(0) += 1;

        let delay = self.delays.get(node).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let code = self.exit_codes.get(node).map(|c| *c).unwrap_or(0);
        let output = format!("{}: {} exited {}\n", node, command, code);
        append_log(log_file, &output).await?;

        Ok(ExecutionResult {
            node: node.clone(),
            status: Some(code),
            duration: started.elapsed(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_executor_appends_log() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeId::new("f1");
        let executor = ScriptedExecutor::new().exit_with(&node, 3);
        let log = dir.path().join("nested").join("f1.log");

        let first = executor.run(&node, "keel-converge", &log).await.unwrap();
        executor.run(&node, "keel-converge", &log).await.unwrap();

        assert!(!first.success());
        assert_eq!(first.status, Some(3));
        assert_eq!(executor.calls(&node), 2);

        let logged = tokio::fs::read_to_string(&log).await.unwrap();
        assert_eq!(logged.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_ssh_executor_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("n1.log");
        // `sh -c <target> <command>` stands in for ssh: the target is the script
        let executor = SshExecutor::new("sh", "").with_option("-c");

        let result = executor
            .run(&NodeId::new("echo converged; exit 2"), "ignored", &log)
            .await
            .unwrap();
        assert_eq!(result.status, Some(2));
        assert_eq!(result.output, "converged\n");
        assert_eq!(tokio::fs::read_to_string(&log).await.unwrap(), "converged\n");
    }
}
