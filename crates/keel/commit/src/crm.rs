//! crm shell backed resource manager
//!
//! Transactions are rendered to a crm script and loaded with
//! `crm configure load update -`, which applies the whole script or none
//! of it.

use std::collections::BTreeSet;
use std::process::Stdio;

use async_trait::async_trait;
use keel_plan::{render_transaction, FencingTopology};
use keel_types::Transaction;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::{CommitError, Result};
use crate::manager::ResourceManager;

/// Object keywords whose second token is the object id
const OBJECT_KEYWORDS: &[&str] = &[
    "primitive",
    "group",
    "clone",
    "ms",
    "location",
    "colocation",
    "order",
];

/// Drives the cluster through the `crm` and `crm_resource` tools
#[derive(Debug, Clone)]
pub struct CrmShellManager {
    crm: String,
    crm_resource: String,
}

impl Default for CrmShellManager {
    fn default() -> Self {
        Self::new("crm", "crm_resource")
    }
}

impl CrmShellManager {
    pub fn new(crm: impl Into<String>, crm_resource: impl Into<String>) -> Self {
        Self {
            crm: crm.into(),
            crm_resource: crm_resource.into(),
        }
    }

    async fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let command = format!("{} {}", program, args.join(" "));
        debug!(command = %command, "Running");

        let mut child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CommitError::Command {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn load_update(&self, script: &str) -> Result<()> {
        self.run(&self.crm, &["configure", "load", "update", "-"], Some(script))
            .await
            .map(|_| ())
    }
}

/// Object ids listed by `crm configure show`
fn parse_ids(show: &str) -> BTreeSet<String> {
    show.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let keyword = tokens.next()?;
            if OBJECT_KEYWORDS.contains(&keyword) {
                tokens.next().map(str::to_string)
            } else {
                None
            }
        })
        .collect()
}

#[async_trait]
impl ResourceManager for CrmShellManager {
    #[instrument(skip(self, transaction), fields(transaction = %transaction.name))]
    async fn commit(&self, transaction: &Transaction) -> Result<()> {
        self.load_update(&render_transaction(transaction)).await?;
        info!(objects = transaction.objects.len(), "Transaction committed");
        Ok(())
    }

    async fn load_fencing(&self, topology: &FencingTopology) -> Result<()> {
        self.load_update(&format!("{}\n", topology.render())).await?;
        info!(levels = topology.levels.len(), "Fencing topology loaded");
        Ok(())
    }

    async fn resources(&self) -> Result<BTreeSet<String>> {
        let show = self.run(&self.crm, &["configure", "show"], None).await?;
        Ok(parse_ids(&show))
    }

    async fn wait_for(&self, resource: &str) -> Result<()> {
        self.run(&self.crm_resource, &["--wait", "--resource", resource], None)
            .await
            .map(|_| ())
    }
}
