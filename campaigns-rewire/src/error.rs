//! Error types for campaigns-rewire.

use thiserror::Error;

use campaigns_core::{ExternalServiceKind, RepoId, StoreError};

/// All errors that can arise while planning or applying a rewire.
#[derive(Debug, Error)]
pub enum RewireError {
    /// A desired spec targets a repository the viewer cannot see. Raised
    /// before any write.
    #[error("repository {repo} not found or not accessible")]
    RepoNotAccessible { repo: RepoId },

    /// A desired spec targets a repository on a code host campaigns cannot
    /// open changesets on. Raised before any write.
    #[error("repository {name} ({repo}) is hosted on {kind}, which campaigns do not support")]
    UnsupportedRepo {
        repo: RepoId,
        name: String,
        kind: ExternalServiceKind,
    },

    /// Two desired specs would push to the same branch of one repository.
    /// Raised before any write.
    #[error("more than one changeset spec targets branch {branch} in repository {repo}")]
    DuplicateBranch { repo: RepoId, branch: String },

    /// Any failure of the persistence collaborator, propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The plan computed at apply time is not the plan the caller reviewed.
    #[error("plan changed since it was reviewed: expected digest {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// JSON serialization error (plan digest).
    #[error("plan JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RewireError {
    /// True for the errors raised by the visibility fence.
    pub fn is_visibility_error(&self) -> bool {
        matches!(
            self,
            RewireError::RepoNotAccessible { .. } | RewireError::UnsupportedRepo { .. }
        )
    }
}
