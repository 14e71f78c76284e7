use assert_cmd::Command;
use predicates::prelude::*;
use shipstatus_updater::test_utils::UpdateFixture;

fn updater(fixture: &UpdateFixture) -> Command {
    let mut cmd = Command::cargo_bin("shipstatus-updater").unwrap();
    cmd.env_remove("SHIPSTATUS_UPDATER_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--no-progress")
        .arg("--app-dir")
        .arg(&fixture.app)
        .arg("--shared-dir")
        .arg(&fixture.shared)
        .arg("--backup-dir")
        .arg(&fixture.backups)
        .arg("--app-executable")
        .arg(fixture.temp.path().join("shipstatus-pro"));
    cmd
}

#[test]
fn test_check_json() {
    let fixture = UpdateFixture::with_pending_release();
    let output = updater(&fixture).arg("check").arg("--json").output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["updateAvailable"], true);
    assert_eq!(json["currentVersion"], "1.0.0");
    assert_eq!(json["newVersion"], "1.1.0");
    assert_eq!(json["isRequired"], false);
}

#[test]
fn test_check_reports_missing_remote() {
    let fixture = UpdateFixture::new();
    fixture.set_local_version("1.0.0");
    updater(&fixture)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("No remote version found"));
}

#[test]
fn test_check_without_shared_drive_fails() {
    let fixture = UpdateFixture::new();
    let mut cmd = Command::cargo_bin("shipstatus-updater").unwrap();
    cmd.env_remove("SHIPSTATUS_UPDATER_CONFIG")
        .arg("--app-dir")
        .arg(&fixture.app)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("shared_drive_path is not set"));
}

#[test]
fn test_update_then_rollback() {
    let fixture = UpdateFixture::with_pending_release();
    let original = fixture.app_tree();

    updater(&fixture)
        .args(["update", "--no-restart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update completed successfully!"));
    assert_eq!(fixture.read_app("public/logo.txt").as_deref(), Some("logo-v2"));

    updater(&fixture)
        .args(["backups", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup-").and(predicate::str::contains("1.0.0")));

    updater(&fixture)
        .arg("rollback")
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));
    assert_eq!(fixture.app_tree(), original);
}

#[test]
fn test_update_without_app_executable_changes_nothing() {
    let fixture = UpdateFixture::with_pending_release();
    let original = fixture.app_tree();

    let mut cmd = Command::cargo_bin("shipstatus-updater").unwrap();
    cmd.env_remove("SHIPSTATUS_UPDATER_CONFIG")
        .arg("--no-progress")
        .arg("--app-dir")
        .arg(&fixture.app)
        .arg("--shared-dir")
        .arg(&fixture.shared)
        .arg("--backup-dir")
        .arg(&fixture.backups)
        .args(["update", "--no-restart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("app_executable is not set"));
    assert_eq!(fixture.app_tree(), original);
    assert!(fixture.backup_names().is_empty());
}

#[test]
fn test_run_json_when_current() {
    let fixture = UpdateFixture::with_pending_release();
    fixture.set_remote_version("1.0.0", false);

    let output = updater(&fixture).args(["run", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["check"]["updateAvailable"], false);
    assert!(json.get("update").is_none() || json["update"].is_null());
    assert!(fixture.backup_names().is_empty());
}

#[test]
fn test_rollback_without_backups_fails() {
    let fixture = UpdateFixture::new();
    updater(&fixture)
        .arg("rollback")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backups found"));
}

#[test]
fn test_backups_prune() {
    let fixture = UpdateFixture::with_pending_release();
    for name in ["backup-2024-01-01T00-00-00-000Z", "backup-2024-02-01T00-00-00-000Z"] {
        std::fs::create_dir_all(fixture.backups.join(name)).unwrap();
    }

    updater(&fixture)
        .args(["backups", "prune", "--keep", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pruned 1 backup(s)"));
    assert_eq!(fixture.backup_names(), vec!["backup-2024-02-01T00-00-00-000Z".to_string()]);
}

#[test]
fn test_status_json() {
    let fixture = UpdateFixture::with_pending_release();
    let output = updater(&fixture).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["localVersion"], "1.0.0");
    assert_eq!(json["remoteVersion"], "1.1.0");
    assert_eq!(json["sharedDriveAccessible"], true);
    assert_eq!(json["writable"], true);
    assert_eq!(json["backups"], 0);
}

#[test]
fn test_config_init_and_show() {
    let fixture = UpdateFixture::new();
    updater(&fixture)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(fixture.app.join("updater.toml").is_file());

    updater(&fixture)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    updater(&fixture)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keep_backups = 5"));
}
