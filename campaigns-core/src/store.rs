//! Persistence and visibility contracts, plus an in-memory implementation.
//!
//! The rewirer only ever talks to [`Store`] and [`RepoAccess`]. A caller that
//! wants transactional semantics hands in a store scoped to its transaction;
//! every write here commits on its own.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{
    Campaign, CampaignId, CampaignSpecId, Changeset, ChangesetId, ChangesetSpec,
    ChangesetSpecDescription, ChangesetSpecId, ExternalServiceKind, Repo, RepoId,
};

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Selector for [`Store::list_changeset_specs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChangesetSpecsOpts {
    /// Every spec belonging to one desired spec set.
    CampaignSpec(CampaignSpecId),
    /// An explicit id list. Missing ids are skipped, not reported.
    Ids(Vec<ChangesetSpecId>),
}

/// Lookup key for [`Store::get_changeset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetChangesetOpts<'a> {
    pub repo_id: RepoId,
    pub external_id: &'a str,
    pub external_service_kind: ExternalServiceKind,
}

/// Transactional CRUD over campaigns, specs and changesets.
pub trait Store {
    fn get_campaign(&self, id: CampaignId) -> Result<Campaign, StoreError>;

    /// Persists the campaign row, including its membership list.
    fn update_campaign(&mut self, campaign: &Campaign) -> Result<(), StoreError>;

    /// Results are ordered by spec id.
    fn list_changeset_specs(
        &self,
        opts: &ListChangesetSpecsOpts,
    ) -> Result<Vec<ChangesetSpec>, StoreError>;

    /// Changesets that list `campaign` as a member or are owned by it.
    /// Results are ordered by changeset id.
    fn list_changesets_attached_or_owned_by_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Vec<Changeset>, StoreError>;

    /// Returns [`StoreError::NotFound`] when no row matches.
    fn get_changeset(&self, opts: &GetChangesetOpts<'_>) -> Result<Changeset, StoreError>;

    /// Assigns `changeset.id` and persists the row.
    fn create_changeset(&mut self, changeset: &mut Changeset) -> Result<(), StoreError>;

    fn update_changeset(&mut self, changeset: &Changeset) -> Result<(), StoreError>;

    fn delete_changeset(&mut self, id: ChangesetId) -> Result<(), StoreError>;
}

/// Security-filtered repository lookup.
///
/// Repositories the viewer cannot see are simply absent from the result;
/// that is never an error.
pub trait RepoAccess {
    fn accessible_repos(&self, ids: &[RepoId]) -> Result<HashMap<RepoId, Repo>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A changeset spec as written by a user, before the store assigns ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChangesetSpec {
    pub repo_id: RepoId,
    #[serde(flatten)]
    pub description: ChangesetSpecDescription,
}

/// Next-id counters. Ids start at 1 and are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub campaign: i64,
    pub campaign_spec: i64,
    pub changeset_spec: i64,
    pub changeset: i64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            campaign: 1,
            campaign_spec: 1,
            changeset_spec: 1,
            changeset: 1,
        }
    }
}

/// `BTreeMap`-backed [`Store`]. Used directly in tests and as the working
/// copy behind [`crate::file_store::FileStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    pub(crate) counters: IdCounters,
    pub(crate) campaigns: BTreeMap<CampaignId, Campaign>,
    pub(crate) changeset_specs: BTreeMap<ChangesetSpecId, ChangesetSpec>,
    pub(crate) changesets: BTreeMap<ChangesetId, Changeset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_campaign(&mut self, name: impl Into<String>) -> Campaign {
        let now = Utc::now();
        let campaign = Campaign {
            id: CampaignId(self.counters.campaign),
            name: name.into(),
            campaign_spec_id: None,
            changeset_ids: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.counters.campaign += 1;
        self.campaigns.insert(campaign.id, campaign.clone());
        campaign
    }

    /// Store a new desired spec set. Specs keep their input order and get
    /// ascending ids.
    pub fn create_campaign_spec(
        &mut self,
        specs: Vec<NewChangesetSpec>,
    ) -> (CampaignSpecId, Vec<ChangesetSpec>) {
        let now = Utc::now();
        let campaign_spec_id = CampaignSpecId(self.counters.campaign_spec);
        self.counters.campaign_spec += 1;

        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = ChangesetSpec {
                id: ChangesetSpecId(self.counters.changeset_spec),
                campaign_spec_id,
                repo_id: spec.repo_id,
                description: spec.description,
                created_at: now,
            };
            self.counters.changeset_spec += 1;
            self.changeset_specs.insert(spec.id, spec.clone());
            created.push(spec);
        }
        (campaign_spec_id, created)
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &Campaign> {
        self.campaigns.values()
    }

    pub fn changesets(&self) -> impl Iterator<Item = &Changeset> {
        self.changesets.values()
    }

    pub fn changeset(&self, id: ChangesetId) -> Option<&Changeset> {
        self.changesets.get(&id)
    }

    pub fn changeset_spec(&self, id: ChangesetSpecId) -> Option<&ChangesetSpec> {
        self.changeset_specs.get(&id)
    }

    fn check_external_id_unique(&self, changeset: &Changeset) -> Result<(), StoreError> {
        let Some(external_id) = changeset.external_id.as_deref() else {
            return Ok(());
        };
        let clash = self.changesets.values().any(|other| {
            other.id != changeset.id
                && other.repo_id == changeset.repo_id
                && other.external_service_kind == changeset.external_service_kind
                && other.external_id.as_deref() == Some(external_id)
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "changeset for external id {external_id} in repo {} already exists",
                changeset.repo_id
            )));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get_campaign(&self, id: CampaignId) -> Result<Campaign, StoreError> {
        self.campaigns
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("campaign", id))
    }

    fn update_campaign(&mut self, campaign: &Campaign) -> Result<(), StoreError> {
        let Some(stored) = self.campaigns.get_mut(&campaign.id) else {
            return Err(StoreError::not_found("campaign", campaign.id));
        };
        *stored = campaign.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    fn list_changeset_specs(
        &self,
        opts: &ListChangesetSpecsOpts,
    ) -> Result<Vec<ChangesetSpec>, StoreError> {
        let specs = match opts {
            ListChangesetSpecsOpts::CampaignSpec(campaign_spec_id) => self
                .changeset_specs
                .values()
                .filter(|s| s.campaign_spec_id == *campaign_spec_id)
                .cloned()
                .collect(),
            ListChangesetSpecsOpts::Ids(ids) => {
                let mut specs: Vec<ChangesetSpec> = ids
                    .iter()
                    .filter_map(|id| self.changeset_specs.get(id))
                    .cloned()
                    .collect();
                specs.sort_by_key(|s| s.id);
                specs.dedup_by_key(|s| s.id);
                specs
            }
        };
        Ok(specs)
    }

    fn list_changesets_attached_or_owned_by_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Vec<Changeset>, StoreError> {
        Ok(self
            .changesets
            .values()
            .filter(|c| c.is_attached_to(campaign) || c.is_owned_by(campaign))
            .cloned()
            .collect())
    }

    fn get_changeset(&self, opts: &GetChangesetOpts<'_>) -> Result<Changeset, StoreError> {
        self.changesets
            .values()
            .find(|c| {
                c.repo_id == opts.repo_id
                    && c.external_service_kind == opts.external_service_kind
                    && c.external_id.as_deref() == Some(opts.external_id)
            })
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(
                    "changeset",
                    format!("repo {} external id {}", opts.repo_id, opts.external_id),
                )
            })
    }

    fn create_changeset(&mut self, changeset: &mut Changeset) -> Result<(), StoreError> {
        changeset.id = ChangesetId(0);
        self.check_external_id_unique(changeset)?;

        let now = Utc::now();
        changeset.id = ChangesetId(self.counters.changeset);
        changeset.created_at = now;
        changeset.updated_at = now;
        self.counters.changeset += 1;
        self.changesets.insert(changeset.id, changeset.clone());
        Ok(())
    }

    fn update_changeset(&mut self, changeset: &Changeset) -> Result<(), StoreError> {
        if !self.changesets.contains_key(&changeset.id) {
            return Err(StoreError::not_found("changeset", changeset.id));
        }
        self.check_external_id_unique(changeset)?;

        let mut row = changeset.clone();
        row.updated_at = Utc::now();
        self.changesets.insert(row.id, row);
        Ok(())
    }

    fn delete_changeset(&mut self, id: ChangesetId) -> Result<(), StoreError> {
        self.changesets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("changeset", id))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
