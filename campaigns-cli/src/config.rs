//! Viewer configuration at `~/.campaigns/config.yaml`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use campaigns_core::paths::{config_path_at, ensure_root_at, write_atomic};
use campaigns_core::{RepoDirectory, RepoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Repositories hidden from the current viewer.
    #[serde(default)]
    pub deny_repos: Vec<RepoId>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            deny_repos: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Load the config; a missing file yields defaults.
    pub fn load_at(home: &Path) -> Result<Self> {
        let path = config_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write the config unless one already exists. Returns whether it wrote.
    pub fn init_at(home: &Path) -> Result<bool> {
        let path = config_path_at(home);
        if path.exists() {
            return Ok(false);
        }
        ensure_root_at(home)?;
        let yaml = serde_yaml::to_string(&Self::default()).context("failed to serialize config")?;
        write_atomic(&path, &yaml)?;
        Ok(true)
    }

    /// The repository directory as seen by this viewer.
    pub fn repo_access_at(&self, home: &Path) -> Result<RepoDirectory> {
        let directory = RepoDirectory::load_at(home).context("failed to load repository directory")?;
        Ok(directory.with_denied(self.deny_repos.iter().copied()))
    }
}
