//! Keel CLI - Proposals, plans and fencing topologies from the terminal
//!
//! Works on YAML or JSON documents (chosen by file extension):
//! - `propose` prints a service's default proposal for an inventory
//! - `validate` checks a proposal against an inventory
//! - `plan` prints the crm script a cluster founder would commit
//! - `fencing` prints the fencing topology for remote members
//! - `wait` blocks until a committed database service is ready

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keel_commit::{CommandProbe, CrmShellManager};
use keel_plan::IsolationMode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod document;
mod error;

use commands::ServiceKind;
use config::KeelConfig;
use document::Format;

/// Keel CLI
#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel - Convergence engine for highly-available services", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KEEL_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "KEEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "KEEL_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default proposal of a service
    Propose {
        #[arg(short, long, value_enum)]
        service: ServiceKind,

        /// Inventory document
        #[arg(short, long)]
        inventory: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        output: Format,
    },

    /// Validate a proposal against an inventory
    Validate {
        #[arg(short, long, value_enum)]
        service: ServiceKind,

        #[arg(short, long)]
        inventory: PathBuf,

        #[arg(short, long)]
        proposal: PathBuf,
    },

    /// Print the resource plan for a settings document
    Plan {
        #[arg(short, long, value_enum)]
        service: ServiceKind,

        #[arg(long)]
        settings: PathBuf,

        /// Resources already defined in the cluster
        #[arg(long, value_delimiter = ',')]
        existing: Vec<String>,
    },

    /// Print the fencing topology for remote members
    Fencing {
        /// Isolation mode; `custom:<resource>` for a custom resource
        #[arg(short, long)]
        mode: Option<IsolationMode>,

        /// Service fence primitive chained after the isolation resource
        #[arg(short, long)]
        fence: Option<String>,

        /// Remote members
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Wait for the committed database service to become ready
    Wait {
        /// Database settings document
        #[arg(long)]
        settings: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = KeelConfig::load(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, cli.json_logs || config.logging.json);

    let output = match cli.command {
        Commands::Propose {
            service,
            inventory,
            output,
        } => commands::proposal::propose(service, &inventory, output, &config)?,
        Commands::Validate {
            service,
            inventory,
            proposal,
        } => commands::proposal::validate(service, &inventory, &proposal, &config)?,
        Commands::Plan {
            service,
            settings,
            existing,
        } => commands::plan::plan(service, &settings, &existing)?,
        Commands::Fencing {
            mode,
            fence,
            members,
        } => {
            let mode = mode.unwrap_or_else(|| config.cluster.stonith_mode.clone());
            commands::fencing::fencing(&mode, fence.as_deref(), &members)
        }
        Commands::Wait { settings } => {
            commands::wait::wait(
                &settings,
                &config.readiness,
                &CrmShellManager::default(),
                &CommandProbe::postgresql(),
            )
            .await?
        }
        Commands::Config => document::render(&config, Format::Yaml)?,
    };

    println!("{}", output.trim_end());
    Ok(())
}
