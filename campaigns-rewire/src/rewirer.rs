//! The [`Rewirer`]: load, plan and apply for one campaign.

use std::collections::BTreeSet;
use std::collections::HashMap;

use campaigns_core::{
    Campaign, Changeset, ChangesetSpec, ListChangesetSpecsOpts, RepoAccess, Repo, RepoId, Store,
};

use crate::apply::{apply, ApplyReport};
use crate::error::RewireError;
use crate::index::ChangesetIndex;
use crate::plan::{plan, PlanInputs, RewirePlan};

/// Everything the planner reads, loaded in one go.
#[derive(Debug, Clone, Default)]
pub struct Associations {
    /// The campaign's desired specs, in spec order.
    pub desired: Vec<ChangesetSpec>,
    /// Changesets attached to or owned by the campaign.
    pub current: Vec<Changeset>,
    /// The specs those changesets currently point to.
    pub current_specs: Vec<ChangesetSpec>,
    /// Repositories of all of the above that the viewer can see.
    pub accessible_repos: HashMap<RepoId, Repo>,
}

/// Load the desired and current state of `campaign`.
///
/// A campaign without a desired spec set has no desired specs; every
/// changeset it holds will be swept.
pub fn load_associations<S, A>(
    store: &S,
    access: &A,
    campaign: &Campaign,
) -> Result<Associations, RewireError>
where
    S: Store + ?Sized,
    A: RepoAccess + ?Sized,
{
    let desired = match campaign.campaign_spec_id {
        Some(id) => store.list_changeset_specs(&ListChangesetSpecsOpts::CampaignSpec(id))?,
        None => Vec::new(),
    };

    let current = store.list_changesets_attached_or_owned_by_campaign(campaign.id)?;

    let current_spec_ids: Vec<_> = current
        .iter()
        .filter_map(|c| c.current_spec_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let current_specs = if current_spec_ids.is_empty() {
        Vec::new()
    } else {
        store.list_changeset_specs(&ListChangesetSpecsOpts::Ids(current_spec_ids))?
    };

    let repo_ids: Vec<RepoId> = desired
        .iter()
        .map(|s| s.repo_id)
        .chain(current.iter().map(|c| c.repo_id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let accessible_repos = access.accessible_repos(&repo_ids)?;

    tracing::debug!(
        "campaign {}: loaded {} desired specs, {} changesets, {}/{} accessible repos",
        campaign.id,
        desired.len(),
        current.len(),
        accessible_repos.len(),
        repo_ids.len()
    );

    Ok(Associations {
        desired,
        current,
        current_specs,
        accessible_repos,
    })
}

/// Load and plan without writing anything.
pub fn plan_campaign<S, A>(store: &S, access: &A, campaign: &Campaign) -> Result<RewirePlan, RewireError>
where
    S: Store + ?Sized,
    A: RepoAccess + ?Sized,
{
    let assoc = load_associations(store, access, campaign)?;
    let index = ChangesetIndex::build(&assoc.current, &assoc.current_specs);
    plan(
        store,
        &PlanInputs {
            campaign: campaign.id,
            desired: &assoc.desired,
            current: &assoc.current,
            index: &index,
            accessible_repos: &assoc.accessible_repos,
        },
    )
}

/// Rewires campaigns through a store and a viewer-scoped repository lookup.
pub struct Rewirer<'a, S: ?Sized, A: ?Sized> {
    store: &'a mut S,
    access: &'a A,
}

impl<'a, S, A> Rewirer<'a, S, A>
where
    S: Store + ?Sized,
    A: RepoAccess + ?Sized,
{
    pub fn new(store: &'a mut S, access: &'a A) -> Self {
        Self { store, access }
    }

    pub fn plan(&self, campaign: &Campaign) -> Result<RewirePlan, RewireError> {
        plan_campaign(&*self.store, self.access, campaign)
    }

    /// Plan and apply. On a visibility error nothing is written.
    pub fn rewire(&mut self, campaign: &mut Campaign) -> Result<ApplyReport, RewireError> {
        let plan = self.plan(campaign)?;
        tracing::info!("campaign {}: applying [{}]", campaign.id, plan);
        apply(&mut *self.store, campaign, plan)
    }

    /// Like [`Rewirer::rewire`], but refuse to apply unless the freshly
    /// computed plan has digest `expected`.
    pub fn rewire_checked(
        &mut self,
        campaign: &mut Campaign,
        expected: &str,
    ) -> Result<ApplyReport, RewireError> {
        let plan = self.plan(campaign)?;
        let actual = plan.digest()?;
        if actual != expected {
            return Err(RewireError::DigestMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        apply(&mut *self.store, campaign, plan)
    }
}
