//! File store error-message, atomic-write-safety, and persistence integration tests.
//! Storage layout: ~/.campaigns/{store,repos}.yaml

use assert_fs::prelude::*;
use campaigns_core::{
    paths, CampaignId, ChangesetId, ExternalServiceKind, FileStore, RepoAccess, RepoDirectory, Repo, RepoId, Store,
    StoreError,
};
use predicates::prelude::predicate;
use std::fs;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn open_missing_store_mentions_init() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = FileStore::open_at(home.path()).unwrap_err();
    assert!(matches!(err, StoreError::StoreNotInitialised { .. }), "got: {err}");
    assert!(err.to_string().contains("campaigns init"));
    assert!(err.to_string().contains("store.yaml"));
}

#[test]
fn open_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".campaigns").create_dir_all().expect("mkdir");
    home.child(".campaigns/store.yaml")
        .write_binary(b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = FileStore::open_at(home.path()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("store.yaml"), "must contain file path, got: {msg}");
}

#[test]
fn open_wrong_type_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".campaigns").create_dir_all().expect("mkdir");
    home.child(".campaigns/store.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");

    let err = FileStore::open_at(home.path()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn init_creates_store_with_owner_only_mode() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    FileStore::init_at(home.path()).expect("init");

    home.child(".campaigns/store.yaml").assert(predicate::path::exists());
    home.child(".campaigns/store.yaml.tmp").assert(predicate::path::missing());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(paths::store_path_at(home.path()))
            .expect("meta")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileStore::init_at(home.path()).expect("init");
    store.create_campaign("gofmt").expect("campaign");

    let path = paths::store_path_at(home.path());
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("store.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&path).expect("read after crash"));
    let reopened = FileStore::open_at(home.path()).expect("reopen");
    assert_eq!(reopened.state().campaigns().count(), 1);
}

// ---------------------------------------------------------------------------
// 3. Campaign membership persistence
// ---------------------------------------------------------------------------

#[test]
fn campaign_membership_is_overwritten_not_merged() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut store = FileStore::init_at(home.path()).expect("init");
    let mut campaign = store.create_campaign("gofmt").expect("campaign");

    campaign.changeset_ids = [ChangesetId(1), ChangesetId(2), ChangesetId(3)].into();
    store.update_campaign(&campaign).expect("first write");
    campaign.changeset_ids = [ChangesetId(3)].into();
    store.update_campaign(&campaign).expect("second write");

    let reopened = FileStore::open_at(home.path()).expect("reopen");
    let loaded = reopened.get_campaign(campaign.id).expect("campaign");
    assert_eq!(loaded.changeset_ids.len(), 1);
}

#[test]
fn unknown_campaign_is_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = FileStore::init_at(home.path()).expect("init");
    let err = store.get_campaign(CampaignId(99)).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("campaign not found: 99"));
}

// ---------------------------------------------------------------------------
// 4. Repository directory
// ---------------------------------------------------------------------------

#[test]
fn repo_directory_persists_next_to_store() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut dir = RepoDirectory::default();
    dir.upsert(Repo {
        id: RepoId(1),
        name: "github.com/sourcegraph/a".to_string(),
        external_service_kind: ExternalServiceKind::GitHub,
    });
    dir.upsert(Repo {
        id: RepoId(2),
        name: "gitolite.example.com/b".to_string(),
        external_service_kind: ExternalServiceKind::Gitolite,
    });
    dir.save_at(home.path()).expect("save");
    home.child(".campaigns/repos.yaml").assert(predicate::path::exists());

    let loaded = RepoDirectory::load_at(home.path())
        .expect("load")
        .with_denied([RepoId(2)]);
    let visible = loaded.accessible_repos(&[RepoId(1), RepoId(2)]).expect("lookup");
    assert_eq!(visible.keys().copied().collect::<Vec<_>>(), vec![RepoId(1)]);
}
