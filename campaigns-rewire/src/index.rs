//! Lookup views over the changesets loaded for one rewire pass.
//!
//! Nothing here mutates; the index borrows the loaded rows and is dropped
//! when the pass ends.

use std::collections::HashMap;

use campaigns_core::refs::ensure_ref_prefix;
use campaigns_core::{Changeset, ChangesetId, ChangesetSpec, RepoId};

/// `(repository, fully qualified branch)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoBranch {
    pub repo: RepoId,
    pub head_ref: String,
}

impl RepoBranch {
    /// Normalizes `branch` so `run-gofmt` and `refs/heads/run-gofmt` collide.
    pub fn new(repo: RepoId, branch: &str) -> Self {
        Self {
            repo,
            head_ref: ensure_ref_prefix(branch),
        }
    }
}

/// `(repository, code host id)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoExternalId {
    pub repo: RepoId,
    pub external_id: String,
}

impl RepoExternalId {
    pub fn new(repo: RepoId, external_id: &str) -> Self {
        Self {
            repo,
            external_id: external_id.to_string(),
        }
    }
}

/// Changesets bucketed by branch and by external id.
#[derive(Debug, Default)]
pub struct ChangesetIndex<'a> {
    by_branch: HashMap<RepoBranch, &'a Changeset>,
    by_external_id: HashMap<RepoExternalId, &'a Changeset>,
    current_specs: HashMap<ChangesetId, &'a ChangesetSpec>,
}

impl<'a> ChangesetIndex<'a> {
    /// Index `changesets`. `current_specs` must contain the spec each
    /// changeset currently points to; they are matched by spec id.
    ///
    /// Branch keys come from the live external branch when the code host has
    /// reported one, otherwise from the current spec's head ref. Pure tracked
    /// imports are left out of the branch index.
    pub fn build(changesets: &'a [Changeset], current_specs: &'a [ChangesetSpec]) -> Self {
        let specs_by_id: HashMap<_, _> = current_specs.iter().map(|s| (s.id, s)).collect();
        let mut index = Self::default();

        for changeset in changesets {
            if let Some(spec_id) = changeset.current_spec_id {
                match specs_by_id.get(&spec_id) {
                    Some(spec) => {
                        index.current_specs.insert(changeset.id, *spec);
                    }
                    None => tracing::warn!(
                        "changeset {} points at spec {} which could not be loaded",
                        changeset.id,
                        spec_id
                    ),
                }
            }

            if let Some(external_id) = changeset.external_id.as_deref() {
                let key = RepoExternalId::new(changeset.repo_id, external_id);
                index.by_external_id.insert(key, changeset);

                if changeset.is_tracked_import() {
                    continue;
                }
            }

            let branch = match changeset.external_branch.as_deref() {
                Some(branch) => Some(branch),
                // Not published (or not synced) yet: use the branch we would push to.
                None => index
                    .current_specs
                    .get(&changeset.id)
                    .copied()
                    .and_then(|spec| spec.head_ref()),
            };
            let Some(branch) = branch else {
                continue;
            };

            let key = RepoBranch::new(changeset.repo_id, branch);
            if let Some(previous) = index.by_branch.insert(key, changeset) {
                tracing::debug!(
                    "changeset {} shadows changeset {} on branch {} in repo {}",
                    changeset.id,
                    previous.id,
                    branch,
                    changeset.repo_id
                );
            }
        }

        index
    }

    pub fn by_branch(&self, key: &RepoBranch) -> Option<&'a Changeset> {
        self.by_branch.get(key).copied()
    }

    pub fn by_external_id(&self, key: &RepoExternalId) -> Option<&'a Changeset> {
        self.by_external_id.get(key).copied()
    }

    pub fn current_spec(&self, changeset: ChangesetId) -> Option<&'a ChangesetSpec> {
        self.current_specs.get(&changeset).copied()
    }

    pub fn branch_count(&self) -> usize {
        self.by_branch.len()
    }

    pub fn external_id_count(&self) -> usize {
        self.by_external_id.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
