//! CLI command implementations
//!
//! Each command returns the text it prints so it can be tested without
//! capturing stdout.

pub mod fencing;
pub mod plan;
pub mod proposal;
pub mod wait;

/// Services the CLI knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServiceKind {
    Database,
    Compute,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Database => keel_orchestrator::database::SERVICE,
            ServiceKind::Compute => keel_orchestrator::compute::SERVICE,
        }
    }
}
