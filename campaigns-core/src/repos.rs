//! Repository directory with viewer-scoped visibility.
//!
//! The directory lists every repository the instance knows about and is
//! persisted at `<home>/.campaigns/repos.yaml`. A [`RepoDirectory`] carries
//! the set of repositories hidden from the current viewer; its
//! [`RepoAccess`] implementation leaves those out, exactly like an
//! authz-filtered database lookup would.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths::{ensure_root_at, repos_path_at, write_atomic};
use crate::store::RepoAccess;
use crate::types::{Repo, RepoId};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RepoDirectoryFile {
    #[serde(default)]
    repos: Vec<Repo>,
}

/// Known repositories plus the ids the viewer may not see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDirectory {
    repos: BTreeMap<RepoId, Repo>,
    denied: BTreeSet<RepoId>,
}

impl RepoDirectory {
    pub fn new(repos: impl IntoIterator<Item = Repo>) -> Self {
        Self {
            repos: repos.into_iter().map(|r| (r.id, r)).collect(),
            denied: BTreeSet::new(),
        }
    }

    /// Hide `denied` from [`RepoAccess::accessible_repos`].
    pub fn with_denied(mut self, denied: impl IntoIterator<Item = RepoId>) -> Self {
        self.denied.extend(denied);
        self
    }

    /// Insert or replace a repository.
    pub fn upsert(&mut self, repo: Repo) {
        self.repos.insert(repo.id, repo);
    }

    pub fn repos(&self) -> impl Iterator<Item = &Repo> {
        self.repos.values()
    }

    pub fn get(&self, id: RepoId) -> Option<&Repo> {
        self.repos.get(&id)
    }

    pub fn is_denied(&self, id: RepoId) -> bool {
        self.denied.contains(&id)
    }

    /// Load `repos.yaml`; an absent file is an empty directory.
    pub fn load_at(home: &Path) -> Result<Self, StoreError> {
        let path = repos_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let file: RepoDirectoryFile = serde_yaml::from_str(&contents)
            .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?;
        Ok(Self::new(file.repos))
    }

    /// Atomically save the repository list. The deny set is viewer config
    /// and is not written.
    pub fn save_at(&self, home: &Path) -> Result<(), StoreError> {
        ensure_root_at(home)?;
        let file = RepoDirectoryFile {
            repos: self.repos.values().cloned().collect(),
        };
        let yaml = serde_yaml::to_string(&file)?;
        write_atomic(&repos_path_at(home), &yaml)
    }
}

impl RepoAccess for RepoDirectory {
    fn accessible_repos(&self, ids: &[RepoId]) -> Result<HashMap<RepoId, Repo>, StoreError> {
        Ok(ids
            .iter()
            .filter(|id| !self.denied.contains(id))
            .filter_map(|id| self.repos.get(id))
            .map(|repo| (repo.id, repo.clone()))
            .collect())
    }
}
