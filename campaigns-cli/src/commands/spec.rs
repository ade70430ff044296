//! `campaigns spec load <campaign> <file>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;

use campaigns_core::{CampaignId, NewChangesetSpec, Store};

use super::open_workspace;

/// Manage desired changeset specs.
#[derive(Subcommand, Debug)]
pub enum SpecCommand {
    /// Store a YAML file of changeset specs as the campaign's desired state.
    Load(LoadArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Campaign id.
    pub campaign: i64,

    /// YAML file with a `changeset_specs:` list.
    pub file: PathBuf,
}

/// On-disk shape of a spec file.
///
/// ```yaml
/// changeset_specs:
///   - repo_id: 1
///     kind: branch
///     head_ref: run-gofmt
///     published: true
///   - repo_id: 3
///     kind: track_existing
///     external_id: "333"
/// ```
#[derive(Debug, Deserialize)]
struct SpecFile {
    #[serde(default)]
    changeset_specs: Vec<NewChangesetSpec>,
}

pub fn run(cmd: SpecCommand) -> Result<()> {
    match cmd {
        SpecCommand::Load(args) => load(args),
    }
}

fn load(args: LoadArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read spec file '{}'", args.file.display()))?;
    let file: SpecFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse spec file '{}'", args.file.display()))?;

    let mut ws = open_workspace()?;
    let mut campaign = ws
        .store
        .get_campaign(CampaignId(args.campaign))
        .with_context(|| format!("cannot load campaign {}", args.campaign))?;

    let count = file.changeset_specs.len();
    let (spec_set, _) = ws
        .store
        .create_campaign_spec(file.changeset_specs)
        .context("failed to store changeset specs")?;
    campaign.campaign_spec_id = Some(spec_set);
    ws.store
        .update_campaign(&campaign)
        .with_context(|| format!("failed to update campaign {}", campaign.id))?;

    println!(
        "✓ Loaded {} changeset specs into campaign {} (spec set {})",
        count, campaign.id, spec_set
    );
    println!("Run: campaigns plan {}", campaign.id);
    Ok(())
}
