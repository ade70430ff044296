//! YAML-file backed [`Store`].
//!
//! The whole state lives in `<home>/.campaigns/store.yaml`. Reads are served
//! from an in-memory [`MemoryStore`]; every mutating call applies the change
//! to a copy of that state, rewrites the file atomically, and only then swaps
//! the copy in. Each write commits on its own, a failure mid-plan leaves
//! earlier writes on disk, and a failed save leaves memory matching the file.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths::{ensure_root_at, home, store_path_at, write_atomic};
use crate::store::{
    GetChangesetOpts, IdCounters, ListChangesetSpecsOpts, MemoryStore, NewChangesetSpec, Store,
};
use crate::types::{
    Campaign, CampaignId, CampaignSpecId, Changeset, ChangesetId, ChangesetSpec,
};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk payload of `store.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    counters: IdCounters,
    #[serde(default)]
    campaigns: Vec<Campaign>,
    #[serde(default)]
    changeset_specs: Vec<ChangesetSpec>,
    #[serde(default)]
    changesets: Vec<Changeset>,
}

impl From<&MemoryStore> for StoreDocument {
    fn from(store: &MemoryStore) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            counters: store.counters.clone(),
            campaigns: store.campaigns.values().cloned().collect(),
            changeset_specs: store.changeset_specs.values().cloned().collect(),
            changesets: store.changesets.values().cloned().collect(),
        }
    }
}

impl From<StoreDocument> for MemoryStore {
    fn from(doc: StoreDocument) -> Self {
        Self {
            counters: doc.counters,
            campaigns: doc.campaigns.into_iter().map(|c| (c.id, c)).collect(),
            changeset_specs: doc.changeset_specs.into_iter().map(|s| (s.id, s)).collect(),
            changesets: doc.changesets.into_iter().map(|c| (c.id, c)).collect(),
        }
    }
}

/// A [`Store`] persisted to `store.yaml`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: MemoryStore,
}

impl FileStore {
    /// Create `<home>/.campaigns/store.yaml` if absent and open it.
    /// Idempotent: an existing store is loaded unchanged.
    pub fn init_at(home: &Path) -> Result<Self, StoreError> {
        ensure_root_at(home)?;
        let path = store_path_at(home);
        if path.exists() {
            return Self::open_at(home);
        }
        let state = MemoryStore::new();
        save(&path, &state)?;
        Ok(Self { path, state })
    }

    /// Open an existing store.
    ///
    /// Returns `StoreError::StoreNotInitialised` if absent,
    /// `StoreError::Parse` (with path + line context) if malformed YAML.
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        let path = store_path_at(home);
        if !path.exists() {
            return Err(StoreError::StoreNotInitialised { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let doc: StoreDocument = serde_yaml::from_str(&contents)
            .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?;
        Ok(Self {
            path,
            state: doc.into(),
        })
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&home()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the loaded state.
    pub fn state(&self) -> &MemoryStore {
        &self.state
    }

    pub fn create_campaign(&mut self, name: impl Into<String>) -> Result<Campaign, StoreError> {
        self.commit(|state| Ok(state.create_campaign(name)))
    }

    pub fn create_campaign_spec(
        &mut self,
        specs: Vec<NewChangesetSpec>,
    ) -> Result<(CampaignSpecId, Vec<ChangesetSpec>), StoreError> {
        self.commit(|state| Ok(state.create_campaign_spec(specs)))
    }

    /// Run `write` against a copy of the state and keep the copy once it is
    /// on disk.
    fn commit<T>(
        &mut self,
        write: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = self.state.clone();
        let out = write(&mut next)?;
        save(&self.path, &next)?;
        self.state = next;
        Ok(out)
    }
}

fn save(path: &Path, state: &MemoryStore) -> Result<(), StoreError> {
    let yaml = serde_yaml::to_string(&StoreDocument::from(state))?;
    write_atomic(path, &yaml)
}

impl Store for FileStore {
    fn get_campaign(&self, id: CampaignId) -> Result<Campaign, StoreError> {
        self.state.get_campaign(id)
    }

    fn update_campaign(&mut self, campaign: &Campaign) -> Result<(), StoreError> {
        self.commit(|state| state.update_campaign(campaign))
    }

    fn list_changeset_specs(
        &self,
        opts: &ListChangesetSpecsOpts,
    ) -> Result<Vec<ChangesetSpec>, StoreError> {
        self.state.list_changeset_specs(opts)
    }

    fn list_changesets_attached_or_owned_by_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Vec<Changeset>, StoreError> {
        self.state.list_changesets_attached_or_owned_by_campaign(campaign)
    }

    fn get_changeset(&self, opts: &GetChangesetOpts<'_>) -> Result<Changeset, StoreError> {
        self.state.get_changeset(opts)
    }

    fn create_changeset(&mut self, changeset: &mut Changeset) -> Result<(), StoreError> {
        let mut created = changeset.clone();
        self.commit(|state| state.create_changeset(&mut created))?;
        *changeset = created;
        Ok(())
    }

    fn update_changeset(&mut self, changeset: &Changeset) -> Result<(), StoreError> {
        self.commit(|state| state.update_changeset(changeset))
    }

    fn delete_changeset(&mut self, id: ChangesetId) -> Result<(), StoreError> {
        self.commit(|state| state.delete_changeset(id))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
