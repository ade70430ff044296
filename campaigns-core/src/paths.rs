//! On-disk layout of the campaign state directory.
//!
//! ```text
//! ~/.campaigns/
//!   config.yaml   (viewer config: log level, denied repositories)
//!   store.yaml    (campaigns, specs, changesets: mode 0600)
//!   repos.yaml    (repository directory: mode 0600)
//! ```
//!
//! Every function takes an explicit `home`; tests pass a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub const STORE_FILE: &str = "store.yaml";
pub const REPOS_FILE: &str = "repos.yaml";
pub const CONFIG_FILE: &str = "config.yaml";

pub fn campaigns_root(home: &Path) -> PathBuf {
    home.join(".campaigns")
}

pub fn store_path_at(home: &Path) -> PathBuf {
    campaigns_root(home).join(STORE_FILE)
}

pub fn repos_path_at(home: &Path) -> PathBuf {
    campaigns_root(home).join(REPOS_FILE)
}

pub fn config_path_at(home: &Path) -> PathBuf {
    campaigns_root(home).join(CONFIG_FILE)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// Create `<home>/.campaigns/` (mode `0700`) if it does not yet exist.
pub fn ensure_root_at(home: &Path) -> Result<PathBuf, StoreError> {
    let dir = campaigns_root(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// Write `contents` to `path` atomically.
///
/// Write flow: `.tmp` sibling → `chmod 0600` → `rename`. The `.tmp` file is
/// always in the target's directory, so the rename never crosses filesystems.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
