//! Role constraint tables of the built-in services

use keel_types::{Cardinality, PlatformRules, RoleConstraint, RoleConstraints};

use crate::error::Result;

/// Role names
pub mod roles {
    pub const DATABASE_SERVER: &str = "database-server";

    pub const COMPUTE_CONTROLLER: &str = "compute-controller";
    pub const COMPUTE_DOCKER: &str = "compute-docker";
    pub const COMPUTE_HYPERV: &str = "compute-hyperv";
    pub const COMPUTE_KVM: &str = "compute-kvm";
    pub const COMPUTE_QEMU: &str = "compute-qemu";
    pub const COMPUTE_VMWARE: &str = "compute-vmware";
    pub const COMPUTE_XEN: &str = "compute-xen";
    pub const COMPUTE_ZVM: &str = "compute-zvm";

    /// Delegate role placed on founders of clusters with remote compute members
    pub const COMPUTE_HA: &str = "compute-ha";

    /// A node may hold at most one of these
    pub const EXCLUSIVE_COMPUTE: &[&str] = &[
        COMPUTE_DOCKER,
        COMPUTE_HYPERV,
        COMPUTE_KVM,
        COMPUTE_QEMU,
        COMPUTE_VMWARE,
        COMPUTE_XEN,
        COMPUTE_ZVM,
    ];
}

fn not_windows_or_old_suse(min_suse: &str) -> Result<PlatformRules> {
    Ok(PlatformRules::new()
        .with("suse", &format!("< {}", min_suse))?
        .with("windows", "/.*/")?)
}

/// Constraints of the database service
pub fn database_constraints() -> Result<RoleConstraints> {
    Ok(RoleConstraints::new().with(
        roles::DATABASE_SERVER,
        RoleConstraint::new(Cardinality::AtMost(1))
            .clustered()
            .without_admin()
            .excluding_platform(not_windows_or_old_suse("12.2")?),
    ))
}

/// Constraints of the compute service
pub fn compute_constraints() -> Result<RoleConstraints> {
    let linux = not_windows_or_old_suse("12.1")?;

    Ok(RoleConstraints::new()
        .with(
            roles::COMPUTE_CONTROLLER,
            RoleConstraint::new(Cardinality::AtMost(1))
                .clustered()
                .excluding_platform(linux.clone()),
        )
        .with(
            roles::COMPUTE_DOCKER,
            RoleConstraint::new(Cardinality::Unbounded).excluding_platform(linux.clone()),
        )
        .with(
            roles::COMPUTE_HYPERV,
            RoleConstraint::new(Cardinality::Unbounded)
                .with_platform(PlatformRules::new().with("windows", "/.*/")?),
        )
        .with(
            roles::COMPUTE_KVM,
            RoleConstraint::new(Cardinality::Unbounded)
                .accepting_remotes()
                .excluding_platform(linux.clone()),
        )
        .with(
            roles::COMPUTE_QEMU,
            RoleConstraint::new(Cardinality::Unbounded)
                .accepting_remotes()
                .excluding_platform(linux.clone()),
        )
        .with(
            roles::COMPUTE_VMWARE,
            RoleConstraint::new(Cardinality::AtMost(1)).excluding_platform(linux.clone()),
        )
        .with(
            roles::COMPUTE_ZVM,
            RoleConstraint::new(Cardinality::AtMost(1)).excluding_platform(linux),
        )
        .with(
            roles::COMPUTE_XEN,
            RoleConstraint::new(Cardinality::Unbounded)
                .accepting_remotes()
                .with_platform(PlatformRules::new().with("suse", "12.1")?),
        ))
}
