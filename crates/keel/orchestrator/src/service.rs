//! Service objects
//!
//! A service owns the server side of one deployable: its default proposal,
//! its validation rules and the adjustments made while a proposal is
//! promoted to a role.

use async_trait::async_trait;
use keel_topology::{Inventory, ValidationReport};
use keel_types::{Proposal, Role};

use crate::error::Result;

/// Server-side lifecycle hooks of one service
#[async_trait]
pub trait Service: Send + Sync {
    /// Service name, also the proposal's `service` field
    fn name(&self) -> &str;

    /// Default proposal for the current inventory
    fn create_proposal(&self, inventory: &Inventory) -> Proposal;

    /// Pure validation pass; never mutates anything
    fn validate(&self, proposal: &Proposal, inventory: &Inventory) -> ValidationReport;

    /// Adjust a freshly promoted role before it is saved
    async fn apply_role_pre(
        &self,
        old: Option<&Role>,
        role: Role,
        inventory: &Inventory,
    ) -> Result<Role>;

    /// Work that needs the saved role
    async fn apply_role_post(
        &self,
        _old: Option<&Role>,
        _role: &Role,
        _inventory: &Inventory,
    ) -> Result<()> {
        Ok(())
    }
}
