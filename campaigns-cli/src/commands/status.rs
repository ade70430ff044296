//! `campaigns status`: changesets, their reconciler state and memberships.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use campaigns_core::refs::abbreviate_ref;
use campaigns_core::{
    Campaign, CampaignId, Changeset, ChangesetId, PublicationState, ReconcilerState, RepoId, Store,
};

use super::open_workspace;

/// Arguments for `campaigns status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show changesets attached to or owned by this campaign.
    #[arg(long)]
    pub campaign: Option<i64>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    campaigns: Vec<CampaignJson>,
    changesets: Vec<ChangesetJson>,
}

#[derive(Serialize)]
struct CampaignJson {
    id: CampaignId,
    name: String,
    changesets: Vec<ChangesetId>,
}

#[derive(Serialize)]
struct ChangesetJson {
    id: ChangesetId,
    repo: RepoId,
    external_id: Option<String>,
    branch: Option<String>,
    publication_state: PublicationState,
    reconciler_state: ReconcilerState,
    closing: bool,
    owner: Option<CampaignId>,
    campaigns: Vec<CampaignId>,
}

#[derive(Tabled)]
struct ChangesetRow {
    #[tabled(rename = "changeset")]
    id: ChangesetId,
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "external")]
    external: String,
    #[tabled(rename = "published")]
    published: String,
    #[tabled(rename = "reconciler")]
    reconciler: String,
    #[tabled(rename = "owner")]
    owner: String,
    #[tabled(rename = "campaigns")]
    campaigns: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let ws = open_workspace()?;
        let state = ws.store.state();

        let (campaigns, changesets): (Vec<Campaign>, Vec<Changeset>) = match self.campaign {
            Some(id) => {
                let id = CampaignId(id);
                let campaign = ws
                    .store
                    .get_campaign(id)
                    .with_context(|| format!("cannot load campaign {id}"))?;
                let changesets = ws
                    .store
                    .list_changesets_attached_or_owned_by_campaign(id)
                    .context("failed to list changesets")?;
                (vec![campaign], changesets)
            }
            None => (
                state.campaigns().cloned().collect(),
                state.changesets().cloned().collect(),
            ),
        };

        if self.json {
            print_json(campaigns, changesets)?;
            return Ok(());
        }
        print_table(&campaigns, changesets, &ws.access);
        Ok(())
    }
}

fn print_json(campaigns: Vec<Campaign>, changesets: Vec<Changeset>) -> Result<()> {
    let payload = StatusJson {
        campaigns: campaigns
            .into_iter()
            .map(|c| CampaignJson {
                id: c.id,
                name: c.name,
                changesets: c.changeset_ids.into_iter().collect(),
            })
            .collect(),
        changesets: changesets
            .into_iter()
            .map(|c| ChangesetJson {
                id: c.id,
                repo: c.repo_id,
                external_id: c.external_id,
                branch: c.external_branch,
                publication_state: c.publication_state,
                reconciler_state: c.reconciler_state,
                closing: c.closing,
                owner: c.owned_by_campaign_id,
                campaigns: c.campaign_ids.into_iter().collect(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(
    campaigns: &[Campaign],
    changesets: Vec<Changeset>,
    access: &campaigns_core::RepoDirectory,
) {
    println!(
        "Campaigns v{} | {} campaigns | {} changesets",
        env!("CARGO_PKG_VERSION"),
        campaigns.len(),
        changesets.len(),
    );
    for campaign in campaigns {
        println!(
            "{} {} ({} changesets)",
            format!("#{}", campaign.id).bold(),
            campaign.name,
            campaign.changeset_ids.len()
        );
    }

    if changesets.is_empty() {
        println!("No changesets.");
        return;
    }

    let rows: Vec<ChangesetRow> = changesets
        .into_iter()
        .map(|c| ChangesetRow {
            id: c.id,
            repo: access
                .get(c.repo_id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| c.repo_id.to_string()),
            external: external_label(&c),
            published: publication_label(&c),
            reconciler: reconciler_label(c.reconciler_state),
            owner: c
                .owned_by_campaign_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            campaigns: c
                .campaign_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn external_label(changeset: &Changeset) -> String {
    match (&changeset.external_id, &changeset.external_branch) {
        (Some(id), Some(branch)) => format!("#{id} ({})", abbreviate_ref(branch)),
        (Some(id), None) => format!("#{id}"),
        (None, Some(branch)) => abbreviate_ref(branch).to_string(),
        (None, None) => "-".to_string(),
    }
}

fn publication_label(changeset: &Changeset) -> String {
    match (changeset.publication_state, changeset.closing) {
        (_, true) => "CLOSING".red().to_string(),
        (PublicationState::Published, false) => "PUBLISHED".green().to_string(),
        (PublicationState::Unpublished, false) => "UNPUBLISHED".bright_black().to_string(),
    }
}

fn reconciler_label(state: ReconcilerState) -> String {
    let label = state.to_string().to_uppercase();
    match state {
        ReconcilerState::Queued => label.yellow().to_string(),
        ReconcilerState::Processing => label.blue().to_string(),
        ReconcilerState::Completed => label.green().to_string(),
        ReconcilerState::Errored => label.red().bold().to_string(),
    }
}
