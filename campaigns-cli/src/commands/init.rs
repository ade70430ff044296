//! `campaigns init`

use anyhow::{Context, Result};
use clap::Args;

use campaigns_core::paths::campaigns_root;
use campaigns_core::{FileStore, RepoDirectory};

use super::home_dir;
use crate::config::CliConfig;

/// Create the campaign state directory.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;

        FileStore::init_at(&home).context("failed to initialise campaign store")?;
        let repos = RepoDirectory::load_at(&home).context("failed to load repository directory")?;
        repos
            .save_at(&home)
            .context("failed to write repository directory")?;
        CliConfig::init_at(&home)?;

        println!("✓ Initialised {}", campaigns_root(&home).display());
        Ok(())
    }
}
