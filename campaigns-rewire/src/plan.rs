//! Planning: match desired specs against current changesets.
//!
//! Resolution order:
//! 1. Visibility fence over every desired spec (fails before any lookup),
//!    which also rejects two branch specs for one `(repo, branch)`.
//! 2. Tracking specs, by `(repo, external id)`; falls back to a store lookup
//!    for changesets other campaigns already track.
//! 3. Branch specs, by `(repo, normalized branch)`, skipping changesets
//!    already claimed in step 2.
//! 4. Sweep of changesets no spec claimed: close, delete or unlink.
//!
//! Operations for steps 2 and 3 are emitted in desired-spec order; sweep
//! operations follow in load order.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use campaigns_core::{
    CampaignId, Changeset, ChangesetId, ChangesetSpec, ChangesetSpecId, GetChangesetOpts,
    ReconcilerState, Repo, RepoId, Store,
};

use crate::error::RewireError;
use crate::index::{ChangesetIndex, RepoBranch, RepoExternalId};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Payload-free tag of a [`RewireOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    None,
    Create,
    Update,
    Reenqueue,
    Close,
    Unlink,
    Delete,
    Track,
    AttachTracked,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::None => "none",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Reenqueue => "reenqueue",
            OperationKind::Close => "close",
            OperationKind::Unlink => "unlink",
            OperationKind::Delete => "delete",
            OperationKind::Track => "track",
            OperationKind::AttachTracked => "attach-tracked",
        };
        f.write_str(s)
    }
}

/// One step of a rewire plan. Each variant carries only what applying it
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewireOperation {
    /// Already attached and healthy; keep as is.
    None { changeset: Changeset },
    /// Already attached but errored; hand back to the reconciler.
    Reenqueue { changeset: Changeset },
    /// An existing tracked changeset this campaign starts tracking too.
    AttachTracked { changeset: Changeset },
    /// Import an external changeset nobody tracks yet.
    Track {
        spec: ChangesetSpec,
        repo: Repo,
        external_id: String,
    },
    /// Author a new changeset from a branch spec.
    Create { spec: ChangesetSpec, repo: Repo },
    /// Point an existing changeset at a new spec.
    Update {
        changeset: Changeset,
        spec: ChangesetSpec,
    },
    /// Owned, published and no longer desired.
    Close { changeset: Changeset },
    /// Owned, never published and no longer desired.
    Delete { changeset: Changeset },
    /// Not owned and no longer desired: drop this campaign's membership only.
    Unlink { changeset: Changeset },
}

impl RewireOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            RewireOperation::None { .. } => OperationKind::None,
            RewireOperation::Reenqueue { .. } => OperationKind::Reenqueue,
            RewireOperation::AttachTracked { .. } => OperationKind::AttachTracked,
            RewireOperation::Track { .. } => OperationKind::Track,
            RewireOperation::Create { .. } => OperationKind::Create,
            RewireOperation::Update { .. } => OperationKind::Update,
            RewireOperation::Close { .. } => OperationKind::Close,
            RewireOperation::Delete { .. } => OperationKind::Delete,
            RewireOperation::Unlink { .. } => OperationKind::Unlink,
        }
    }

    /// The existing changeset this operation acts on, if any.
    pub fn changeset(&self) -> Option<&Changeset> {
        match self {
            RewireOperation::None { changeset }
            | RewireOperation::Reenqueue { changeset }
            | RewireOperation::AttachTracked { changeset }
            | RewireOperation::Update { changeset, .. }
            | RewireOperation::Close { changeset }
            | RewireOperation::Delete { changeset }
            | RewireOperation::Unlink { changeset } => Some(changeset),
            RewireOperation::Track { .. } | RewireOperation::Create { .. } => None,
        }
    }

    /// The desired spec driving this operation, if any.
    pub fn spec(&self) -> Option<&ChangesetSpec> {
        match self {
            RewireOperation::Track { spec, .. }
            | RewireOperation::Create { spec, .. }
            | RewireOperation::Update { spec, .. } => Some(spec),
            _ => None,
        }
    }

    pub fn repo_id(&self) -> RepoId {
        match self {
            RewireOperation::Track { repo, .. } | RewireOperation::Create { repo, .. } => repo.id,
            other => other.changeset().map(|c| c.repo_id).unwrap_or_default(),
        }
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            kind: self.kind(),
            repo_id: self.repo_id(),
            changeset_id: self.changeset().map(|c| c.id),
            spec_id: self.spec().map(|s| s.id),
        }
    }
}

/// Serializable, timestamp-free view of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub repo_id: RepoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset_id: Option<ChangesetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<ChangesetSpecId>,
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} repo={}", self.kind, self.repo_id)?;
        if let Some(id) = self.changeset_id {
            write!(f, " changeset={id}")?;
        }
        if let Some(id) = self.spec_id {
            write!(f, " spec={id}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Ordered list of operations moving a campaign to its desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewirePlan(pub Vec<RewireOperation>);

impl RewirePlan {
    pub fn operations(&self) -> &[RewireOperation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.0.iter().map(RewireOperation::kind).collect()
    }

    /// True when applying the plan would write nothing but the membership.
    pub fn is_noop(&self) -> bool {
        self.0
            .iter()
            .all(|op| op.kind() == OperationKind::None)
    }

    pub fn summaries(&self) -> Vec<OperationSummary> {
        self.0.iter().map(RewireOperation::summary).collect()
    }

    /// SHA-256 hex digest of the operation summaries. Two plans over the same
    /// state produce the same digest.
    pub fn digest(&self) -> Result<String, RewireError> {
        let canonical = serde_json::to_vec(&self.summaries())?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for RewirePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.0.iter().map(|op| op.kind().to_string()).collect();
        f.write_str(&kinds.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Everything one planning pass reads.
#[derive(Debug)]
pub struct PlanInputs<'a> {
    pub campaign: CampaignId,
    pub desired: &'a [ChangesetSpec],
    pub current: &'a [Changeset],
    pub index: &'a ChangesetIndex<'a>,
    pub accessible_repos: &'a HashMap<RepoId, Repo>,
}

/// Compute the plan for one campaign.
///
/// The only store access is the read-only `get_changeset` lookup for
/// tracking specs; nothing is written.
pub fn plan<S: Store + ?Sized>(
    store: &S,
    inputs: &PlanInputs<'_>,
) -> Result<RewirePlan, RewireError> {
    let repos = fence(inputs.desired, inputs.accessible_repos)?;

    let mut planner = Planner {
        store,
        inputs,
        claimed: HashSet::new(),
        pending_tracks: HashSet::new(),
    };
    let mut slots: Vec<Option<RewireOperation>> = vec![None; inputs.desired.len()];

    // External ids first, so they win over branch matches regardless of the
    // order specs were written in.
    for (slot, (spec, repo)) in slots.iter_mut().zip(inputs.desired.iter().zip(&repos)) {
        if let Some(external_id) = spec.importing_external_id() {
            *slot = planner.resolve_tracking(spec, repo, external_id)?;
        }
    }
    for (slot, (spec, repo)) in slots.iter_mut().zip(inputs.desired.iter().zip(&repos)) {
        if let Some(head_ref) = spec.head_ref() {
            *slot = Some(planner.resolve_branch(spec, repo, head_ref));
        }
    }

    let mut operations: Vec<RewireOperation> = slots.into_iter().flatten().collect();
    operations.extend(planner.sweep());

    let plan = RewirePlan(operations);
    tracing::debug!("campaign {}: calculated plan is [{}]", inputs.campaign, plan);
    Ok(plan)
}

/// Resolve the repository of every desired spec, or fail naming the first
/// one the viewer cannot use. Two branch specs for the same repository and
/// branch are rejected as well.
fn fence<'r>(
    desired: &[ChangesetSpec],
    accessible_repos: &'r HashMap<RepoId, Repo>,
) -> Result<Vec<&'r Repo>, RewireError> {
    let repos = desired
        .iter()
        .map(|spec| -> Result<&'r Repo, RewireError> {
            // A desired spec in a hidden repository fails the whole plan.
            let repo = accessible_repos
                .get(&spec.repo_id)
                .ok_or(RewireError::RepoNotAccessible { repo: spec.repo_id })?;
            if !repo.external_service_kind.is_supported() {
                return Err(RewireError::UnsupportedRepo {
                    repo: repo.id,
                    name: repo.name.clone(),
                    kind: repo.external_service_kind,
                });
            }
            Ok(repo)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut branches = HashSet::new();
    for spec in desired {
        let Some(head_ref) = spec.head_ref() else {
            continue;
        };
        if !branches.insert(RepoBranch::new(spec.repo_id, head_ref)) {
            return Err(RewireError::DuplicateBranch {
                repo: spec.repo_id,
                branch: head_ref.to_string(),
            });
        }
    }

    Ok(repos)
}

struct Planner<'p, 'a, S: ?Sized> {
    store: &'p S,
    inputs: &'p PlanInputs<'a>,
    /// Changesets matched by some desired spec in this pass.
    claimed: HashSet<ChangesetId>,
    /// External ids a `Track` operation has already been emitted for.
    pending_tracks: HashSet<RepoExternalId>,
}

impl<S: Store + ?Sized> Planner<'_, '_, S> {
    fn resolve_tracking(
        &mut self,
        spec: &ChangesetSpec,
        repo: &Repo,
        external_id: &str,
    ) -> Result<Option<RewireOperation>, RewireError> {
        let campaign = self.inputs.campaign;
        let key = RepoExternalId::new(repo.id, external_id);

        if let Some(changeset) = self.inputs.index.by_external_id(&key) {
            let first_claim = self.claimed.insert(changeset.id);
            let changeset = changeset.clone();
            let op = if !first_claim {
                RewireOperation::None { changeset }
            } else if !changeset.is_attached_to(campaign) {
                RewireOperation::AttachTracked { changeset }
            } else if changeset.reconciler_state == ReconcilerState::Errored {
                RewireOperation::Reenqueue { changeset }
            } else {
                RewireOperation::None { changeset }
            };
            return Ok(Some(op));
        }

        if self.pending_tracks.contains(&key) {
            return Ok(None);
        }

        // Not associated with this campaign: another campaign may already
        // track it.
        let lookup = self.store.get_changeset(&GetChangesetOpts {
            repo_id: repo.id,
            external_id,
            external_service_kind: repo.external_service_kind,
        });
        match lookup {
            Ok(existing) => {
                if !self.claimed.insert(existing.id) {
                    return Ok(None);
                }
                Ok(Some(RewireOperation::AttachTracked {
                    changeset: existing,
                }))
            }
            Err(err) if err.is_not_found() => {
                self.pending_tracks.insert(key);
                Ok(Some(RewireOperation::Track {
                    spec: spec.clone(),
                    repo: repo.clone(),
                    external_id: external_id.to_string(),
                }))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn resolve_branch(&mut self, spec: &ChangesetSpec, repo: &Repo, head_ref: &str) -> RewireOperation {
        let campaign = self.inputs.campaign;
        let key = RepoBranch::new(repo.id, head_ref);

        let matched = self
            .inputs
            .index
            .by_branch(&key)
            .filter(|c| !self.claimed.contains(&c.id));
        let Some(changeset) = matched else {
            // The reconciler pushes the branch, and opens the pull request
            // only when the spec asks to be published.
            return RewireOperation::Create {
                spec: spec.clone(),
                repo: repo.clone(),
            };
        };

        self.claimed.insert(changeset.id);
        let changeset = changeset.clone();
        let unchanged =
            changeset.current_spec_id == Some(spec.id) && changeset.is_attached_to(campaign);
        if !unchanged {
            return RewireOperation::Update {
                changeset,
                spec: spec.clone(),
            };
        }
        if changeset.reconciler_state == ReconcilerState::Errored {
            RewireOperation::Reenqueue { changeset }
        } else {
            RewireOperation::None { changeset }
        }
    }

    fn sweep(&self) -> Vec<RewireOperation> {
        let campaign = self.inputs.campaign;
        let mut operations = Vec::new();

        for changeset in self.inputs.current {
            if self.claimed.contains(&changeset.id) {
                continue;
            }
            // Never detach or close what the viewer cannot currently see.
            if !self.inputs.accessible_repos.contains_key(&changeset.repo_id) {
                tracing::warn!(
                    "campaign {}: skipping changeset {} in inaccessible repo {}",
                    campaign,
                    changeset.id,
                    changeset.repo_id
                );
                continue;
            }
            // Detached by an earlier pass; only its owner link remains.
            if !changeset.is_attached_to(campaign) {
                continue;
            }

            let changeset = changeset.clone();
            let op = if changeset.is_owned_by(campaign) && changeset.current_spec_id.is_some() {
                if changeset.is_published() {
                    RewireOperation::Close { changeset }
                } else {
                    RewireOperation::Delete { changeset }
                }
            } else {
                RewireOperation::Unlink { changeset }
            };
            operations.push(op);
        }

        operations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use campaigns_core::{
        BranchSpec, CampaignSpecId, ChangesetSpecDescription, DiffStat, ExternalServiceKind,
        MemoryStore, PublicationState,
    };
    use chrono::Utc;

    const CAMPAIGN: CampaignId = CampaignId(1);

    fn repo(id: i32) -> Repo {
        Repo {
            id: RepoId(id),
            name: format!("github.com/org/repo-{id}"),
            external_service_kind: ExternalServiceKind::GitHub,
        }
    }

    fn repos(ids: &[i32]) -> HashMap<RepoId, Repo> {
        ids.iter().map(|id| (RepoId(*id), repo(*id))).collect()
    }

    fn branch_spec(id: i64, repo: i32, head_ref: &str) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId(id),
            campaign_spec_id: CampaignSpecId(2),
            repo_id: RepoId(repo),
            description: ChangesetSpecDescription::Branch(BranchSpec {
                head_ref: head_ref.to_string(),
                base_ref: None,
                title: String::new(),
                body: String::new(),
                commit_message: String::new(),
                published: true,
                diff_stat: DiffStat::default(),
            }),
            created_at: Utc::now(),
        }
    }

    fn tracking_spec(id: i64, repo: i32, external_id: &str) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId(id),
            campaign_spec_id: CampaignSpecId(2),
            repo_id: RepoId(repo),
            description: ChangesetSpecDescription::TrackExisting {
                external_id: external_id.to_string(),
            },
            created_at: Utc::now(),
        }
    }

    fn owned(id: i64, repo: i32, spec: i64) -> Changeset {
        let mut cs = Changeset {
            id: ChangesetId(id),
            repo_id: RepoId(repo),
            current_spec_id: Some(ChangesetSpecId(spec)),
            owned_by_campaign_id: Some(CAMPAIGN),
            ..Default::default()
        };
        cs.attach_to(CAMPAIGN);
        cs
    }

    fn run(
        store: &MemoryStore,
        desired: &[ChangesetSpec],
        current: &[Changeset],
        current_specs: &[ChangesetSpec],
        accessible: &HashMap<RepoId, Repo>,
    ) -> Result<RewirePlan, RewireError> {
        let index = ChangesetIndex::build(current, current_specs);
        plan(
            store,
            &PlanInputs {
                campaign: CAMPAIGN,
                desired,
                current,
                index: &index,
                accessible_repos: accessible,
            },
        )
    }

    #[test]
    fn empty_inputs_give_empty_plan() {
        let plan = run(&MemoryStore::new(), &[], &[], &[], &HashMap::new()).expect("plan");
        assert!(plan.is_empty());
        assert!(plan.is_noop());
        assert_eq!(plan.to_string(), "");
    }

    #[test]
    fn new_branch_spec_creates() {
        let desired = vec![branch_spec(1, 1, "run-gofmt")];
        let plan = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1])).expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::Create]);
    }

    #[test]
    fn inaccessible_desired_repo_fails_naming_repo() {
        let desired = vec![branch_spec(1, 1, "a"), branch_spec(2, 9, "b")];
        let err = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1])).unwrap_err();
        assert!(matches!(err, RewireError::RepoNotAccessible { repo } if repo == RepoId(9)));
        assert!(err.is_visibility_error());
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn unsupported_code_host_fails() {
        let desired = vec![branch_spec(1, 1, "a")];
        let mut accessible = repos(&[1]);
        if let Some(r) = accessible.get_mut(&RepoId(1)) {
            r.external_service_kind = ExternalServiceKind::Gitolite;
        }
        let err = run(&MemoryStore::new(), &desired, &[], &[], &accessible).unwrap_err();
        assert!(matches!(err, RewireError::UnsupportedRepo { .. }), "got: {err}");
        assert!(err.to_string().contains("gitolite"));
    }

    #[test]
    fn duplicate_branch_specs_fail_after_normalizing() {
        let desired = vec![
            branch_spec(1, 1, "run-gofmt"),
            branch_spec(2, 2, "run-gofmt"),
            branch_spec(3, 1, "refs/heads/run-gofmt"),
        ];
        let err = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1, 2])).unwrap_err();
        assert!(
            matches!(&err, RewireError::DuplicateBranch { repo, branch }
                if *repo == RepoId(1) && branch == "refs/heads/run-gofmt"),
            "got: {err}"
        );
        assert!(!err.is_visibility_error());
    }

    #[test]
    fn same_spec_already_attached_is_noop() {
        let spec = branch_spec(1, 1, "run-gofmt");
        let current = vec![owned(10, 1, 1)];
        let plan = run(
            &MemoryStore::new(),
            std::slice::from_ref(&spec),
            &current,
            std::slice::from_ref(&spec),
            &repos(&[1]),
        )
        .expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::None]);
    }

    #[test]
    fn same_spec_but_errored_is_reenqueued() {
        let spec = branch_spec(1, 1, "run-gofmt");
        let mut cs = owned(10, 1, 1);
        cs.reconciler_state = ReconcilerState::Errored;
        let plan = run(
            &MemoryStore::new(),
            std::slice::from_ref(&spec),
            &[cs],
            std::slice::from_ref(&spec),
            &repos(&[1]),
        )
        .expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::Reenqueue]);
    }

    #[test]
    fn tracking_spec_found_elsewhere_attaches() {
        let mut store = MemoryStore::new();
        let mut other = Changeset {
            repo_id: RepoId(1),
            external_id: Some("333".to_string()),
            ..Default::default()
        };
        other.attach_to(CampaignId(77));
        campaigns_core::Store::create_changeset(&mut store, &mut other).expect("seed");

        let desired = vec![tracking_spec(1, 1, "333")];
        let plan = run(&store, &desired, &[], &[], &repos(&[1])).expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::AttachTracked]);
        assert_eq!(plan.operations()[0].changeset().map(|c| c.id), Some(other.id));
    }

    #[test]
    fn duplicate_tracking_specs_track_once() {
        let desired = vec![tracking_spec(1, 1, "333"), tracking_spec(2, 1, "333")];
        let plan = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1])).expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::Track]);
    }

    #[test]
    fn tracking_match_beats_earlier_branch_spec() {
        // Changeset 10 is reachable both through branch `run-gofmt` and
        // through external id 111; the branch spec is listed first.
        let old_spec = branch_spec(5, 1, "run-gofmt");
        let mut cs = owned(10, 1, 5);
        cs.external_id = Some("111".to_string());
        cs.external_branch = Some("run-gofmt".to_string());
        cs.publication_state = PublicationState::Published;

        let desired = vec![branch_spec(6, 1, "run-gofmt"), tracking_spec(7, 1, "111")];
        let plan = run(&MemoryStore::new(), &desired, &[cs], &[old_spec], &repos(&[1]))
            .expect("plan");
        assert_eq!(plan.kinds(), vec![OperationKind::Create, OperationKind::None]);
        assert_eq!(plan.operations()[1].changeset().map(|c| c.id), Some(ChangesetId(10)));
    }

    #[test]
    fn sweep_skips_inaccessible_and_detached_changesets() {
        let hidden = owned(1, 2, 1);
        let mut detached = owned(2, 1, 1);
        detached.detach_from(CAMPAIGN);
        detached.closing = true;
        let plan = run(
            &MemoryStore::new(),
            &[],
            &[hidden, detached],
            &[],
            &repos(&[1]),
        )
        .expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn digest_is_stable_and_sensitive() {
        let desired = vec![branch_spec(1, 1, "a")];
        let a = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1])).expect("plan");
        let b = run(&MemoryStore::new(), &desired, &[], &[], &repos(&[1])).expect("plan");
        assert_eq!(a.digest().expect("digest"), b.digest().expect("digest"));
        assert_eq!(a.digest().expect("digest").len(), 64);

        let empty = RewirePlan::default();
        assert_ne!(a.digest().expect("digest"), empty.digest().expect("digest"));
    }

    #[test]
    fn plan_display_joins_kinds() {
        let plan = RewirePlan(vec![
            RewireOperation::Create { spec: branch_spec(1, 1, "a"), repo: repo(1) },
            RewireOperation::Unlink { changeset: owned(2, 1, 1) },
        ]);
        assert_eq!(plan.to_string(), "create, unlink");
        assert_eq!(
            plan.summaries()[0].to_string(),
            "create repo=1 spec=1"
        );
    }

    #[test]
    fn attach_tracked_kind_is_kebab_case() {
        let json = serde_json::to_string(&OperationKind::AttachTracked).expect("serialize");
        assert_eq!(json, "\"attach-tracked\"");
        assert_eq!(OperationKind::AttachTracked.to_string(), "attach-tracked");
    }
}
