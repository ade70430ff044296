pub mod apply;
pub mod campaign;
pub mod init;
pub mod plan;
pub mod repo;
pub mod spec;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

use campaigns_core::{FileStore, RepoDirectory};

use crate::config::CliConfig;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// The store plus the viewer-filtered repository directory.
pub(crate) struct Workspace {
    pub store: FileStore,
    pub access: RepoDirectory,
}

pub(crate) fn open_workspace() -> Result<Workspace> {
    let home = home_dir()?;
    let config = CliConfig::load_at(&home)?;
    let store = FileStore::open_at(&home).context("failed to open campaign store")?;
    let access = config.repo_access_at(&home)?;
    tracing::debug!(
        store = %store.path().display(),
        denied = config.deny_repos.len(),
        "opened workspace"
    );
    Ok(Workspace { store, access })
}
