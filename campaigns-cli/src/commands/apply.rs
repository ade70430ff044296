//! `campaigns apply <campaign> [--expect-digest <hex>]`

use anyhow::{Context, Result};
use clap::Args;

use campaigns_core::CampaignId;
use campaigns_rewire::{pipeline, OperationKind};

use super::open_workspace;
use super::plan::kind_label;

/// Arguments for `campaigns apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Campaign id.
    pub campaign: i64,

    /// Refuse to apply unless the plan still has this digest (from
    /// `campaigns plan`).
    #[arg(long, value_name = "HEX")]
    pub expect_digest: Option<String>,

    /// Emit the apply report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let mut ws = open_workspace()?;
        let campaign = CampaignId(self.campaign);
        let report = pipeline::run(
            &mut ws.store,
            &ws.access,
            campaign,
            self.expect_digest.as_deref(),
        )
        .with_context(|| format!("apply failed for campaign {campaign}"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize apply report")?
            );
            return Ok(());
        }

        for outcome in &report.outcomes {
            if outcome.kind == OperationKind::None {
                continue;
            }
            println!("  {:<16} changeset {}", kind_label(outcome.kind), outcome.changeset_id);
        }
        let members: Vec<String> = report.changeset_ids.iter().map(|id| id.to_string()).collect();
        println!(
            "✓ Applied {} operations to campaign {} ({} writes)",
            report.outcomes.len(),
            campaign,
            report.writes()
        );
        println!("  changesets: [{}]", members.join(", "));
        Ok(())
    }
}
