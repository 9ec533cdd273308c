//! `keel wait`: post-commit readiness wait for the database service

use std::path::Path;

use keel_commit::{wait_ready, LivenessProbe, ReadinessConfig, ResourceManager};
use keel_plan::{DatabaseHaPlan, DatabaseHaSettings};
use tracing::info;

use crate::document;
use crate::error::CliResult;

/// Wait for the resource the database plan commits, with the configured bounds
pub async fn wait(
    settings: &Path,
    readiness: &ReadinessConfig,
    manager: &dyn ResourceManager,
    probe: &dyn LivenessProbe,
) -> CliResult<String> {
    let settings: DatabaseHaSettings = document::load(settings)?;
    let plan = DatabaseHaPlan::build(&settings)?;
    let check = readiness.apply(&plan.readiness);
    info!(resource = %check.resource, timeout = ?check.timeout, "Waiting for service");

    wait_ready(manager, probe, &check).await?;
    Ok(format!("{} is ready", check.resource))
}
