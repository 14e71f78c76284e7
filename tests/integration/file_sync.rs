use std::sync::Arc;

use shipstatus_updater::test_utils::{EventLog, RecordingProcess, UpdateFixture};
use shipstatus_updater::updater::{
    ElevationChoice, FileUpdater, FixedChoice, ProgressStatus, SyncOutcome,
};

fn updater(fixture: &UpdateFixture, events: Arc<EventLog>) -> FileUpdater {
    FileUpdater::from_config(
        &fixture.config(),
        events,
        Arc::new(RecordingProcess::new()),
        Arc::new(FixedChoice(ElevationChoice::Cancel)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_rollback_round_trip() {
    let fixture = UpdateFixture::with_pending_release();
    let events = Arc::new(EventLog::new());
    let files = updater(&fixture, events.clone());
    let original = fixture.app_tree();

    let backup = files.backup_current_files().await.unwrap();
    assert_eq!(files.update_files(&backup).await.unwrap(), SyncOutcome::Applied);
    assert_ne!(fixture.app_tree(), original);

    assert!(files.rollback(&backup).await);
    assert_eq!(fixture.app_tree(), original);
    assert!(events.statuses().contains(&ProgressStatus::Rollback));
}

#[tokio::test]
async fn test_snapshots_listed_newest_first() {
    let fixture = UpdateFixture::with_pending_release();
    let files = updater(&fixture, Arc::new(EventLog::new()));

    let first = files.backup_current_files().await.unwrap();
    fixture.set_local_version("1.0.1");
    let second = files.backup_current_files().await.unwrap();

    let snapshots = files.list_backups().await.unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].path, second);
    assert_eq!(snapshots[1].path, first);
    assert_eq!(snapshots[0].app_version.as_deref(), Some("1.0.1"));
    assert_eq!(files.latest_backup().await.unwrap().unwrap().path, second);
}

#[tokio::test]
async fn test_prune_is_idempotent() {
    let fixture = UpdateFixture::with_pending_release();
    let files = updater(&fixture, Arc::new(EventLog::new()));
    for _ in 0..4 {
        files.backup_current_files().await.unwrap();
    }
    let newest = files.latest_backup().await.unwrap().unwrap();

    assert_eq!(files.cleanup_old_backups(2).await.len(), 2);
    assert!(files.cleanup_old_backups(2).await.is_empty());
    assert_eq!(fixture.backup_names().len(), 2);
    assert_eq!(files.latest_backup().await.unwrap().unwrap().path, newest.path);
}

#[tokio::test]
async fn test_prune_without_backups_root() {
    let fixture = UpdateFixture::new();
    let files = updater(&fixture, Arc::new(EventLog::new()));
    assert!(files.cleanup_old_backups(5).await.is_empty());
    assert!(files.list_backups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_restore_of_older_snapshot() {
    let fixture = UpdateFixture::with_pending_release();
    let files = updater(&fixture, Arc::new(EventLog::new()));
    let original = fixture.app_tree();

    let backup = files.backup_current_files().await.unwrap();
    files.update_files(&backup).await.unwrap();
    let name = backup.file_name().unwrap().to_string_lossy().into_owned();

    let snapshot = files.backup_store().find(&name).await.unwrap();
    files.restore(&snapshot.path).await.unwrap();
    assert_eq!(fixture.app_tree(), original);
}
