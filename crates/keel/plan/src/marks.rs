//! Synchronization marks used around HA resource creation

use keel_types::SyncMark;

/// All database nodes installed and configured before resources are built
pub fn database_before_ha(revision: u64) -> SyncMark {
    SyncMark::new("database", "before_ha").with_revision(revision)
}

/// Guards creation of the database HA resources
pub fn database_ha_resources(revision: u64) -> SyncMark {
    SyncMark::new("database", "ha_resources").with_revision(revision)
}

/// Orders the initial streaming replication clone after the primary is up
pub fn database_streaming_replication_setup(revision: u64) -> SyncMark {
    SyncMark::new("database", "streaming_replication_setup").with_revision(revision)
}

/// All compute cluster nodes ready before compute HA resources are built
pub fn compute_before_ha() -> SyncMark {
    SyncMark::new("nova", "compute_before_ha")
}

/// Guards creation of the compute HA resources
pub fn compute_ha_resources() -> SyncMark {
    SyncMark::new("nova", "compute_ha_resources")
}
