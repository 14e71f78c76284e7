use std::sync::Arc;

use shipstatus_updater::config::{ElevationMode, UpdaterConfig};
use shipstatus_updater::test_utils::{EventLog, RecordingProcess, UpdateFixture};
use shipstatus_updater::updater::version_check::NO_REMOTE_VERSION;
#[cfg(unix)]
use shipstatus_updater::updater::elevation::{ElevationScripts, ScriptContext, ScriptFlavor};
use shipstatus_updater::updater::{
    ElevationChoice, FixedChoice, ProgressStatus, UpdateOrchestrator,
};

struct Setup {
    orchestrator: UpdateOrchestrator,
    events: Arc<EventLog>,
    process: Arc<RecordingProcess>,
}

fn setup(
    fixture: &UpdateFixture,
    configure: impl FnOnce(&mut UpdaterConfig),
    choice: ElevationChoice,
) -> Setup {
    let mut config = fixture.config();
    configure(&mut config);
    let events = Arc::new(EventLog::new());
    let process = Arc::new(RecordingProcess::new());
    let orchestrator = UpdateOrchestrator::builder(config)
        .listener(events.clone())
        .process(process.clone())
        .prompt(Arc::new(FixedChoice(choice)))
        .build()
        .unwrap();
    Setup {
        orchestrator,
        events,
        process,
    }
}

#[tokio::test]
async fn test_scenario_newer_release_is_applied() {
    let fixture = UpdateFixture::with_pending_release();
    let s = setup(&fixture, |_| {}, ElevationChoice::Cancel);

    let report = s.orchestrator.run().await;
    assert!(report.check.update_available);
    assert_eq!(report.check.current_version(), Some("1.0.0"));
    assert_eq!(report.check.new_version(), Some("1.1.0"));

    let update = report.update.unwrap();
    assert!(update.success);
    assert!(fixture.read_app("version.json").unwrap().contains("1.1.0"));

    s.orchestrator.wait_for_restart().await;
    assert_eq!(s.process.relaunched().len(), 1);
}

#[tokio::test]
async fn test_scenario_missing_remote_descriptor() {
    let fixture = UpdateFixture::with_pending_release();
    std::fs::remove_file(fixture.shared.join("version.json")).unwrap();
    let s = setup(&fixture, |_| {}, ElevationChoice::Cancel);

    let check = s.orchestrator.check_only().await;
    let json = serde_json::to_value(&check).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"updateAvailable": false, "error": NO_REMOTE_VERSION})
    );
    assert!(s.orchestrator.run().await.update.is_none());
    assert!(fixture.backup_names().is_empty());
}

#[tokio::test]
async fn test_scenario_no_write_permission_cancelled() {
    let fixture = UpdateFixture::with_pending_release();
    let readonly = fixture.temp.path().join("program-files");
    let s = setup(
        &fixture,
        |config| {
            config.app_path = Some(readonly.clone());
            config.elevation = ElevationMode::Prompt;
        },
        ElevationChoice::Cancel,
    );

    let result = s.orchestrator.perform_update().await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Update cancelled: Administrator privileges are required")
    );
    // no mirror copy was attempted
    assert!(!readonly.join("src").exists());
    assert!(!s.events.statuses().contains(&ProgressStatus::Update));
    let helper = if cfg!(windows) { "update-helper.bat" } else { "update-helper.sh" };
    assert!(fixture.scripts.join(helper).is_file());
    assert!(s.process.exits().is_empty());
    assert!(!s.orchestrator.is_update_in_progress());
}

#[tokio::test]
async fn test_scenario_no_write_permission_handed_off() {
    let fixture = UpdateFixture::with_pending_release();
    let s = setup(
        &fixture,
        |config| {
            config.app_path = Some(fixture.temp.path().join("program-files"));
            config.elevation = ElevationMode::Always;
        },
        ElevationChoice::Cancel,
    );

    let result = s.orchestrator.perform_update().await;
    assert!(result.success);
    assert!(result.handed_off);
    assert!(!result.restart_scheduled);
    assert_eq!(s.process.launched().len(), 1);
    assert_eq!(s.process.exits(), vec![0]);
    assert_eq!(s.events.statuses().last(), Some(&ProgressStatus::Elevated));
}

#[cfg(unix)]
fn write_shell_scripts(fixture: &UpdateFixture) -> ElevationScripts {
    let context = ScriptContext {
        app_name: "ShipStatus Pro".to_string(),
        current_version: "1.0.0".to_string(),
        new_version: "1.1.0".to_string(),
        source_path: fixture.shared.clone(),
        dest_path: fixture.app.clone(),
        mirrored_dirs: vec!["src".to_string(), "public".to_string()],
        required_dirs: vec!["src".to_string()],
        manifest_files: vec!["package.json".to_string(), "version.json".to_string()],
        app_executable: fixture.temp.path().join("shipstatus-pro"),
        restart_delay_secs: 1,
        helper_path: Default::default(),
    };
    ElevationScripts::write(&fixture.scripts, ScriptFlavor::Shell, &context).unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn test_generated_helper_mirrors_release() {
    let fixture = UpdateFixture::with_pending_release();
    let scripts = write_shell_scripts(&fixture);

    let status = std::process::Command::new("sh").arg(&scripts.helper).output().unwrap();
    assert!(status.status.success(), "{}", String::from_utf8_lossy(&status.stdout));

    let expected = shipstatus_updater::test_utils::fixtures::tree(&fixture.shared);
    assert_eq!(fixture.app_tree(), expected);
}

#[cfg(unix)]
#[tokio::test]
async fn test_generated_helper_refuses_incomplete_release() {
    let fixture = UpdateFixture::with_pending_release();
    std::fs::remove_dir_all(fixture.shared.join("src")).unwrap();
    let original = fixture.app_tree();
    let scripts = write_shell_scripts(&fixture);

    let output = std::process::Command::new("sh").arg(&scripts.helper).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Source files not found"));
    assert_eq!(fixture.app_tree(), original);
}

#[tokio::test]
async fn test_channel_listener_receives_events() {
    let fixture = UpdateFixture::with_pending_release();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = UpdateOrchestrator::builder(fixture.config())
        .listener(Arc::new(tx))
        .process(Arc::new(RecordingProcess::new()))
        .build()
        .unwrap();

    assert!(orchestrator.perform_update().await.success);
    orchestrator.cancel_restart();
    drop(orchestrator);

    let mut statuses = Vec::new();
    while let Some(event) = rx.recv().await {
        statuses.push(event.status);
    }
    assert_eq!(statuses.first(), Some(&ProgressStatus::Start));
    assert_eq!(statuses.last(), Some(&ProgressStatus::Complete));
}
