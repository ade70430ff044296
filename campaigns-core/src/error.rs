//! Error types for campaigns-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from store and repository-directory operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched the lookup. Callers that probe for optional rows
    /// treat this as "absent" rather than a failure.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A write would violate a uniqueness constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.campaigns/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The state directory has not been initialised.
    #[error("campaign store not found at {path}; run `campaigns init` first")]
    StoreNotInitialised { path: PathBuf },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
