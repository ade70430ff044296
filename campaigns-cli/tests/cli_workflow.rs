use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn campaigns_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_campaigns"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let assert = campaigns_cmd(home).args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8")
}

fn json(home: &Path, args: &[&str]) -> serde_json::Value {
    serde_json::from_str(&run_ok(home, args)).expect("valid JSON on stdout")
}

const SPECS: &str = r#"
changeset_specs:
  - repo_id: 1
    kind: branch
    head_ref: run-gofmt
    title: Run gofmt
    published: true
  - repo_id: 2
    kind: branch
    head_ref: run-gofmt
    title: Run gofmt
  - repo_id: 3
    kind: track_existing
    external_id: "333"
"#;

/// init, three GitHub repos, one campaign with `SPECS` loaded.
fn setup(home: &TempDir) {
    run_ok(home.path(), &["init"]);
    for (id, name) in [("1", "github.com/org/a"), ("2", "github.com/org/b"), ("3", "github.com/org/c")] {
        run_ok(home.path(), &["repo", "add", id, name]);
    }
    let out = run_ok(home.path(), &["campaign", "create", "gofmt"]);
    assert!(out.contains("Created campaign 1"), "got: {out}");

    let spec_file = home.path().join("specs.yaml");
    fs::write(&spec_file, SPECS).expect("write specs");
    let spec_path = spec_file.to_string_lossy().to_string();
    let out = run_ok(home.path(), &["spec", "load", "1", &spec_path]);
    assert!(out.contains("Loaded 3 changeset specs"), "got: {out}");
}

#[test]
fn init_creates_private_state_files() {
    let home = TempDir::new().expect("home");
    campaigns_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Initialised"));

    let root = home.path().join(".campaigns");
    assert!(root.join("store.yaml").is_file());
    assert!(root.join("repos.yaml").is_file());
    assert!(root.join("config.yaml").is_file());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(root.join("store.yaml"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    // Idempotent.
    campaigns_cmd(home.path()).arg("init").assert().success();
}

#[test]
fn commands_before_init_point_at_init() {
    let home = TempDir::new().expect("home");
    campaigns_cmd(home.path())
        .args(["plan", "1"])
        .assert()
        .failure()
        .stderr(contains("campaigns init"));
}

#[test]
fn plan_then_apply_with_digest_converges() {
    let home = TempDir::new().expect("home");
    setup(&home);

    let plan = json(home.path(), &["plan", "1", "--json"]);
    let kinds: Vec<&str> = plan["operations"]
        .as_array()
        .expect("operations array")
        .iter()
        .map(|op| op["kind"].as_str().expect("kind"))
        .collect();
    assert_eq!(kinds, vec!["create", "create", "track"]);
    let digest = plan["digest"].as_str().expect("digest").to_string();
    assert_eq!(digest.len(), 64);

    campaigns_cmd(home.path())
        .args(["apply", "1", "--expect-digest", &digest])
        .assert()
        .success()
        .stdout(contains("Applied 3 operations"));

    let status = json(home.path(), &["status", "--campaign", "1", "--json"]);
    let changesets = status["changesets"].as_array().expect("changesets");
    assert_eq!(changesets.len(), 3);
    assert!(changesets
        .iter()
        .all(|c| c["reconciler_state"] == "queued" && c["campaigns"] == serde_json::json!([1])));
    assert_eq!(status["campaigns"][0]["changesets"], serde_json::json!([1, 2, 3]));

    campaigns_cmd(home.path())
        .args(["plan", "1"])
        .assert()
        .success()
        .stdout(contains("Nothing to do."));
}

#[test]
fn stale_digest_is_refused() {
    let home = TempDir::new().expect("home");
    setup(&home);

    campaigns_cmd(home.path())
        .args(["apply", "1", "--expect-digest", "abc123"])
        .assert()
        .failure()
        .stderr(contains("plan changed since it was reviewed"));

    let status = json(home.path(), &["status", "--json"]);
    assert_eq!(status["changesets"], serde_json::json!([]));
}

#[test]
fn denied_repository_blocks_planning() {
    let home = TempDir::new().expect("home");
    setup(&home);
    fs::write(
        home.path().join(".campaigns").join("config.yaml"),
        "log_level: warn\ndeny_repos: [2]\n",
    )
    .expect("write config");

    campaigns_cmd(home.path())
        .args(["apply", "1"])
        .assert()
        .failure()
        .stderr(contains("repository 2 not found or not accessible"));

    let status = json(home.path(), &["status", "--json"]);
    assert_eq!(status["changesets"], serde_json::json!([]));
}

#[test]
fn unsupported_code_host_blocks_planning() {
    let home = TempDir::new().expect("home");
    setup(&home);
    run_ok(home.path(), &["repo", "add", "3", "git.example.com/c", "--kind", "gitolite"]);

    campaigns_cmd(home.path())
        .args(["plan", "1"])
        .assert()
        .failure()
        .stderr(contains("gitolite").and(contains("do not support")));
}

#[test]
fn repo_add_rejects_unknown_kind() {
    let home = TempDir::new().expect("home");
    run_ok(home.path(), &["init"]);
    campaigns_cmd(home.path())
        .args(["repo", "add", "1", "svn.example.com/a", "--kind", "svn"])
        .assert()
        .failure()
        .stderr(contains("unknown code host"));
}

#[test]
fn repo_list_marks_denied_repositories() {
    let home = TempDir::new().expect("home");
    run_ok(home.path(), &["init"]);
    run_ok(home.path(), &["repo", "add", "1", "github.com/org/a"]);
    run_ok(home.path(), &["repo", "add", "2", "gitlab.com/org/b", "--kind", "gitlab"]);
    fs::write(
        home.path().join(".campaigns").join("config.yaml"),
        "deny_repos: [2]\n",
    )
    .expect("write config");

    let out = run_ok(home.path(), &["repo", "list"]);
    assert!(out.contains("github.com/org/a"));
    assert!(out.contains("gitlab.com/org/b"));
    let denied_line = out
        .lines()
        .find(|line| line.contains("gitlab.com/org/b"))
        .expect("row for repo 2");
    assert!(denied_line.contains("no"), "got: {denied_line}");
}

#[test]
fn spec_load_rejects_malformed_yaml() {
    let home = TempDir::new().expect("home");
    run_ok(home.path(), &["init"]);
    run_ok(home.path(), &["campaign", "create", "gofmt"]);
    let spec_file = home.path().join("bad.yaml");
    fs::write(&spec_file, "changeset_specs:\n  - repo_id: 1\n    kind: carrier_pigeon\n")
        .expect("write");

    campaigns_cmd(home.path())
        .args(["spec", "load", "1"])
        .arg(&spec_file)
        .assert()
        .failure()
        .stderr(contains("failed to parse spec file"));
}
