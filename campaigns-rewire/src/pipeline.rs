//! Shared rewire entrypoints used by the CLI.

use campaigns_core::{CampaignId, RepoAccess, Store};

use crate::apply::ApplyReport;
use crate::error::RewireError;
use crate::plan::RewirePlan;
use crate::rewirer::{plan_campaign, Rewirer};

/// Compute the plan for a stored campaign without writing anything.
pub fn preview<S, A>(store: &S, access: &A, campaign: CampaignId) -> Result<RewirePlan, RewireError>
where
    S: Store + ?Sized,
    A: RepoAccess + ?Sized,
{
    let campaign = store.get_campaign(campaign)?;
    plan_campaign(store, access, &campaign)
}

/// Rewire a stored campaign. With `expected_digest`, the apply is refused
/// unless the plan is still the one the caller previewed.
pub fn run<S, A>(
    store: &mut S,
    access: &A,
    campaign: CampaignId,
    expected_digest: Option<&str>,
) -> Result<ApplyReport, RewireError>
where
    S: Store + ?Sized,
    A: RepoAccess + ?Sized,
{
    let mut campaign = store.get_campaign(campaign)?;
    let mut rewirer = Rewirer::new(store, access);
    match expected_digest {
        Some(expected) => rewirer.rewire_checked(&mut campaign, expected),
        None => rewirer.rewire(&mut campaign),
    }
}
