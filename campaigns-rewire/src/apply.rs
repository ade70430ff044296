//! Applying a [`RewirePlan`] through the store.
//!
//! Each operation is one or two store writes; the campaign's membership list
//! is written last. A failure stops at the failing operation and leaves the
//! campaign row untouched, so re-planning after a partial apply converges.

use std::collections::BTreeSet;

use serde::Serialize;

use campaigns_core::{
    Campaign, CampaignId, Changeset, ChangesetId, ChangesetSpec, PublicationState,
    ReconcilerState, Repo, Store,
};

use crate::error::RewireError;
use crate::plan::{OperationKind, RewireOperation, RewirePlan};

/// What one applied operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedOperation {
    pub kind: OperationKind,
    /// The changeset written or removed. For `track` and `create` this is
    /// the freshly assigned id.
    pub changeset_id: ChangesetId,
}

/// Result of a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<AppliedOperation>,
    /// The campaign's membership after the apply.
    pub changeset_ids: BTreeSet<ChangesetId>,
}

impl ApplyReport {
    pub fn count(&self, kind: OperationKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    /// Number of operations that wrote to the store.
    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind != OperationKind::None)
            .count()
    }
}

/// Apply `plan` to `campaign` and persist the resulting membership.
pub fn apply<S: Store + ?Sized>(
    store: &mut S,
    campaign: &mut Campaign,
    plan: RewirePlan,
) -> Result<ApplyReport, RewireError> {
    let mut attached = BTreeSet::new();
    let mut outcomes = Vec::with_capacity(plan.len());

    for op in plan.0 {
        let kind = op.kind();
        let changeset_id = apply_one(store, campaign.id, op, &mut attached)?;
        tracing::info!(
            "campaign {}: {} changeset {}",
            campaign.id,
            kind,
            changeset_id
        );
        outcomes.push(AppliedOperation { kind, changeset_id });
    }

    campaign.changeset_ids = attached.clone();
    store.update_campaign(campaign)?;

    Ok(ApplyReport {
        outcomes,
        changeset_ids: attached,
    })
}

fn apply_one<S: Store + ?Sized>(
    store: &mut S,
    campaign: CampaignId,
    op: RewireOperation,
    attached: &mut BTreeSet<ChangesetId>,
) -> Result<ChangesetId, RewireError> {
    let id = match op {
        RewireOperation::None { changeset } => changeset.id,

        RewireOperation::Reenqueue { mut changeset } => {
            changeset.attach_to(campaign);
            changeset.reset_queued();
            store.update_changeset(&changeset)?;
            changeset.id
        }

        RewireOperation::AttachTracked { mut changeset } => {
            changeset.attach_to(campaign);
            if changeset.closing {
                // Tracked again after a close: keep the pull request open.
                changeset.closing = false;
                changeset.reset_queued();
            } else if changeset.reconciler_state == ReconcilerState::Errored {
                changeset.reset_queued();
            }
            store.update_changeset(&changeset)?;
            changeset.id
        }

        RewireOperation::Track {
            repo, external_id, ..
        } => {
            let mut changeset = tracked_changeset(campaign, &repo, external_id);
            store.create_changeset(&mut changeset)?;
            changeset.id
        }

        RewireOperation::Create { spec, repo } => {
            let mut changeset = owned_changeset(campaign, &spec, &repo);
            store.create_changeset(&mut changeset)?;
            changeset.id
        }

        RewireOperation::Update {
            mut changeset,
            spec,
        } => {
            if changeset.current_spec_id != Some(spec.id) {
                changeset.previous_spec_id = changeset.current_spec_id;
                changeset.current_spec_id = Some(spec.id);
            }
            changeset.attach_to(campaign);
            if let Some(diff_stat) = spec.diff_stat() {
                changeset.diff_stat = Some(diff_stat);
            }
            // A spec that reappears cancels a pending close.
            changeset.closing = false;
            changeset.reset_queued();
            store.update_changeset(&changeset)?;
            changeset.id
        }

        RewireOperation::Close { mut changeset } => {
            changeset.closing = true;
            changeset.reset_queued();
            changeset.detach_from(campaign);
            store.update_changeset(&changeset)?;
            // Detached and closed: not part of the membership.
            return Ok(changeset.id);
        }

        RewireOperation::Delete { changeset } => {
            store.delete_changeset(changeset.id)?;
            return Ok(changeset.id);
        }

        RewireOperation::Unlink { mut changeset } => {
            changeset.detach_from(campaign);
            store.update_changeset(&changeset)?;
            return Ok(changeset.id);
        }
    };

    attached.insert(id);
    Ok(id)
}

/// A fresh row for an external changeset the reconciler will sync.
fn tracked_changeset(campaign: CampaignId, repo: &Repo, external_id: String) -> Changeset {
    let mut changeset = Changeset {
        repo_id: repo.id,
        external_service_kind: repo.external_service_kind,
        external_id: Some(external_id),
        publication_state: PublicationState::Published,
        reconciler_state: ReconcilerState::Queued,
        unsynced: true,
        ..Default::default()
    };
    changeset.attach_to(campaign);
    changeset
}

/// A fresh row owned by `campaign`; the reconciler pushes the branch.
fn owned_changeset(campaign: CampaignId, spec: &ChangesetSpec, repo: &Repo) -> Changeset {
    let mut changeset = Changeset {
        repo_id: repo.id,
        external_service_kind: repo.external_service_kind,
        current_spec_id: Some(spec.id),
        owned_by_campaign_id: Some(campaign),
        publication_state: PublicationState::Unpublished,
        reconciler_state: ReconcilerState::Queued,
        diff_stat: spec.diff_stat(),
        ..Default::default()
    };
    changeset.attach_to(campaign);
    changeset
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
