//! Campaigns core library: domain types, persistence contracts, stores, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`StoreError`]
//! - [`store`]: the [`Store`] / [`RepoAccess`] contracts and [`MemoryStore`]
//! - [`file_store`]: YAML-backed [`FileStore`]
//! - [`repos`]: [`RepoDirectory`], the viewer-filtered repository lookup
//! - [`refs`]: branch name normalization
//! - [`paths`]: state directory layout

pub mod error;
pub mod file_store;
pub mod paths;
pub mod refs;
pub mod repos;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use file_store::FileStore;
pub use repos::RepoDirectory;
pub use store::{
    GetChangesetOpts, ListChangesetSpecsOpts, MemoryStore, NewChangesetSpec, RepoAccess, Store,
};
pub use types::{
    BranchSpec, Campaign, CampaignId, CampaignSpecId, Changeset, ChangesetId, ChangesetSpec,
    ChangesetSpecDescription, ChangesetSpecId, DiffStat, ExternalServiceKind, PublicationState,
    ReconcilerState, Repo, RepoId,
};
