//! Campaigns: reconcile campaign changeset specs with tracked changesets.
//!
//! # Usage
//!
//! ```text
//! campaigns init
//! campaigns repo add <id> <name> [--kind github|gitlab|bitbucketserver|...]
//! campaigns repo list
//! campaigns campaign create <name>
//! campaigns spec load <campaign> <file.yaml>
//! campaigns plan <campaign> [--json]
//! campaigns apply <campaign> [--expect-digest <hex>] [--json]
//! campaigns status [--campaign <id>] [--json]
//! ```

mod commands;
mod config;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use campaigns_core::ExternalServiceKind;
use commands::{
    apply::ApplyArgs, campaign::CampaignCommand, init::InitArgs, plan::PlanArgs,
    repo::RepoCommand, spec::SpecCommand, status::StatusArgs,
};
use config::{CliConfig, LogFormat};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "campaigns",
    version,
    about = "Plan and apply campaign changeset rewiring",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.campaigns/ with an empty store, repository directory and config.
    Init(InitArgs),

    /// Manage the repository directory.
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Manage campaigns.
    Campaign {
        #[command(subcommand)]
        command: CampaignCommand,
    },

    /// Load desired changeset specs for a campaign.
    Spec {
        #[command(subcommand)]
        command: SpecCommand,
    },

    /// Show the operations that applying would perform.
    Plan(PlanArgs),

    /// Rewire a campaign's changesets to match its specs.
    Apply(ApplyArgs),

    /// Show changesets, reconciler states and memberships.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Shared code host argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `ExternalServiceKind` from CLI args.
#[derive(Debug, Clone, Default)]
pub struct ServiceKindArg(pub ExternalServiceKind);

impl FromStr for ServiceKindArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        ExternalServiceKind::all()
            .iter()
            .find(|kind| kind.to_string() == wanted)
            .map(|kind| Self(*kind))
            .ok_or_else(|| {
                let names: Vec<String> =
                    ExternalServiceKind::all().iter().map(|k| k.to_string()).collect();
                format!("unknown code host '{s}'; expected: {}", names.join(", "))
            })
    }
}

impl fmt::Display for ServiceKindArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ServiceKindArg> for ExternalServiceKind {
    fn from(k: ServiceKindArg) -> Self {
        k.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Repo { command } => commands::repo::run(command),
        Commands::Campaign { command } => commands::campaign::run(command),
        Commands::Spec { command } => commands::spec::run(command),
        Commands::Plan(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Log to stderr. `RUST_LOG` wins over the configured level; an unreadable
/// config falls back to defaults so logging never blocks a command.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let config = dirs::home_dir()
        .and_then(|home| CliConfig::load_at(&home).ok())
        .unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match config.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
