//! `campaigns repo add <id> <name>` and `campaigns repo list`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use campaigns_core::{Repo, RepoDirectory, RepoId};

use super::home_dir;
use crate::config::CliConfig;
use crate::ServiceKindArg;

/// Manage the repository directory.
#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Register or replace a repository.
    Add(AddArgs),

    /// List known repositories.
    List,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Numeric repository id.
    pub id: i32,

    /// Repository name (e.g. "github.com/org/api").
    pub name: String,

    /// Code host kind: github | gitlab | bitbucketserver | awscodecommit |
    /// gitolite | phabricator | other.
    #[arg(long, default_value = "github")]
    pub kind: ServiceKindArg,
}

#[derive(Tabled)]
struct RepoRow {
    #[tabled(rename = "id")]
    id: RepoId,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "visible")]
    visible: String,
}

pub fn run(cmd: RepoCommand) -> Result<()> {
    match cmd {
        RepoCommand::Add(args) => add(args),
        RepoCommand::List => list(),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let mut directory =
        RepoDirectory::load_at(&home).context("failed to load repository directory")?;
    let repo = Repo {
        id: RepoId(args.id),
        name: args.name,
        external_service_kind: args.kind.into(),
    };
    println!(
        "✓ Registered repository {} '{}' ({})",
        repo.id, repo.name, repo.external_service_kind
    );
    directory.upsert(repo);
    directory
        .save_at(&home)
        .context("failed to write repository directory")?;
    Ok(())
}

fn list() -> Result<()> {
    let home = home_dir()?;
    let config = CliConfig::load_at(&home)?;
    let directory = config.repo_access_at(&home)?;

    let rows: Vec<RepoRow> = directory
        .repos()
        .map(|repo| RepoRow {
            id: repo.id,
            name: repo.name.clone(),
            kind: repo.external_service_kind.to_string(),
            visible: if directory.is_denied(repo.id) {
                "no".to_string()
            } else {
                "yes".to_string()
            },
        })
        .collect();

    if rows.is_empty() {
        println!("No repositories registered.");
        println!("Run: campaigns repo add <id> <name>");
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
