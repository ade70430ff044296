//! `campaigns campaign create <name>`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::open_workspace;

/// Manage campaigns.
#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create an empty campaign and print its id.
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Human-readable campaign name.
    pub name: String,
}

pub fn run(cmd: CampaignCommand) -> Result<()> {
    match cmd {
        CampaignCommand::Create(args) => create(args),
    }
}

fn create(args: CreateArgs) -> Result<()> {
    let mut ws = open_workspace()?;
    let campaign = ws
        .store
        .create_campaign(args.name.clone())
        .with_context(|| format!("failed to create campaign '{}'", args.name))?;
    println!("✓ Created campaign {} '{}'", campaign.id, campaign.name);
    Ok(())
}
