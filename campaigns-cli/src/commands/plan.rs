//! `campaigns plan <campaign> [--json]`: dry run.

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use campaigns_core::CampaignId;
use campaigns_rewire::{pipeline, OperationKind, OperationSummary};

use super::open_workspace;

/// Arguments for `campaigns plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Campaign id.
    pub campaign: i64,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanJson {
    campaign: CampaignId,
    digest: String,
    operations: Vec<OperationSummary>,
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "operation")]
    kind: String,
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "changeset")]
    changeset: String,
    #[tabled(rename = "spec")]
    spec: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let ws = open_workspace()?;
        let campaign = CampaignId(self.campaign);
        let plan = pipeline::preview(&ws.store, &ws.access, campaign)
            .with_context(|| format!("planning failed for campaign {campaign}"))?;
        let digest = plan.digest().context("failed to compute plan digest")?;

        if self.json {
            let payload = PlanJson {
                campaign,
                digest,
                operations: plan.summaries(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        println!("Campaign {campaign}: {} operations", plan.len());
        if !plan.is_empty() {
            let rows: Vec<OperationRow> = plan
                .summaries()
                .into_iter()
                .enumerate()
                .map(|(i, op)| OperationRow {
                    position: i + 1,
                    kind: kind_label(op.kind).to_string(),
                    repo: op.repo_id.to_string(),
                    changeset: op
                        .changeset_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    spec: op
                        .spec_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        println!("digest: {digest}");
        if plan.is_noop() {
            println!("Nothing to do.");
        } else {
            println!("Run: campaigns apply {campaign} --expect-digest {digest}");
        }
        Ok(())
    }
}

/// Operation name colored by how destructive it is.
pub(crate) fn kind_label(kind: OperationKind) -> ColoredString {
    let name = kind.to_string();
    match kind {
        OperationKind::None => name.bright_black(),
        OperationKind::Create | OperationKind::Track | OperationKind::AttachTracked => name.green(),
        OperationKind::Update | OperationKind::Reenqueue => name.yellow(),
        OperationKind::Unlink => name.magenta(),
        OperationKind::Close | OperationKind::Delete => name.red(),
    }
}
