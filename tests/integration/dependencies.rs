use std::sync::Arc;

use shipstatus_updater::test_utils::{EventLog, UpdateFixture};
use shipstatus_updater::updater::{DependencyManager, ProgressStatus};

fn manager(fixture: &UpdateFixture, command: &[&str], events: Arc<EventLog>) -> DependencyManager {
    DependencyManager::new(
        fixture.app.clone(),
        command.iter().map(|s| s.to_string()).collect(),
        events,
    )
}

#[tokio::test]
async fn test_diff_is_asymmetric() {
    let fixture = UpdateFixture::new();
    fixture.set_local_dependencies(&[("mssql", "^9.1.0"), ("electron-store", "^8.0.0")]);
    fixture.set_remote_dependencies(&[("mssql", "^9.1.0")]);
    let deps = manager(&fixture, &["true"], Arc::new(EventLog::new()));

    let installed = fixture.app.join("package.json");
    let published = fixture.shared.join("package.json");
    // A removal alone does not trigger an install
    assert!(!deps.dependencies_need_update(&installed, &published).await);
    assert!(deps.dependencies_need_update(&published, &installed).await);
}

#[tokio::test]
async fn test_unreadable_manifest_means_update() {
    let fixture = UpdateFixture::new();
    fixture.set_local_dependencies(&[("mssql", "^9.1.0")]);
    let deps = manager(&fixture, &["true"], Arc::new(EventLog::new()));
    assert!(
        deps.dependencies_need_update(
            &fixture.app.join("package.json"),
            &fixture.shared.join("package.json")
        )
        .await
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_relays_output() {
    let fixture = UpdateFixture::new();
    let events = Arc::new(EventLog::new());
    let deps = manager(&fixture, &["sh", "-c", "echo added 42 packages"], events.clone());

    deps.install_dependencies().await.unwrap();
    assert!(events.contains(ProgressStatus::Dependencies, "Installing dependencies..."));
    assert!(events.contains(
        ProgressStatus::Dependencies,
        "Installing dependencies: added 42 packages"
    ));
    assert!(events.contains(ProgressStatus::Dependencies, "Dependencies installed successfully"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_runs_in_app_directory() {
    let fixture = UpdateFixture::new();
    let deps = manager(&fixture, &["sh", "-c", "touch installed.marker"], Arc::new(EventLog::new()));
    deps.install_dependencies().await.unwrap();
    assert!(fixture.app.join("installed.marker").is_file());
}

#[tokio::test]
async fn test_missing_program_is_launch_error() {
    let fixture = UpdateFixture::new();
    let events = Arc::new(EventLog::new());
    let deps = manager(&fixture, &["shipstatus-no-such-package-manager"], events.clone());

    let err = deps.install_dependencies().await.unwrap_err();
    assert!(err.to_string().starts_with("Error running shipstatus-no-such-package-manager"));
    assert!(events.statuses().contains(&ProgressStatus::Error));
}
