use shipstatus_updater::test_utils::UpdateFixture;
use shipstatus_updater::updater::VersionChecker;
use shipstatus_updater::updater::version_check::{NO_LOCAL_VERSION, NO_REMOTE_VERSION};

fn checker(fixture: &UpdateFixture) -> VersionChecker {
    VersionChecker::new(&fixture.app, &fixture.shared, "version.json")
}

#[tokio::test]
async fn test_newer_remote_is_available() {
    let fixture = UpdateFixture::new();
    fixture.set_local_version("1.0.0");
    fixture.set_remote_version("1.1.0", false);

    let check = checker(&fixture).check_for_updates().await.unwrap();
    assert!(check.update_available);
    assert_eq!(check.current_version(), Some("1.0.0"));
    assert_eq!(check.new_version(), Some("1.1.0"));
    assert!(!check.is_required());
}

#[tokio::test]
async fn test_missing_remote_descriptor() {
    let fixture = UpdateFixture::new();
    fixture.set_local_version("1.0.0");

    let check = checker(&fixture).check_for_updates().await.unwrap();
    assert!(!check.update_available);
    assert_eq!(check.error.as_deref(), Some(NO_REMOTE_VERSION));
}

#[tokio::test]
async fn test_missing_local_descriptor() {
    let fixture = UpdateFixture::new();
    fixture.set_remote_version("1.1.0", true);

    let check = checker(&fixture).check_for_updates().await.unwrap();
    assert!(!check.update_available);
    assert_eq!(check.error.as_deref(), Some(NO_LOCAL_VERSION));
}

#[tokio::test]
async fn test_unreachable_shared_drive() {
    let fixture = UpdateFixture::new();
    fixture.set_local_version("1.0.0");
    let checker = VersionChecker::new(
        &fixture.app,
        &fixture.temp.path().join("offline-share"),
        "version.json",
    );

    assert!(!checker.is_shared_drive_accessible().await);
    assert!(checker.get_remote_version().await.is_none());
    let check = checker.check_for_updates().await.unwrap();
    assert_eq!(check.error.as_deref(), Some(NO_REMOTE_VERSION));
}

#[tokio::test]
async fn test_malformed_descriptor_reads_as_missing() {
    let fixture = UpdateFixture::new();
    fixture.write_app("version.json", "{ not json");
    fixture.set_remote_version("1.1.0", false);

    assert!(checker(&fixture).get_local_version().await.is_none());
    let check = checker(&fixture).check_for_updates().await.unwrap();
    assert_eq!(check.error.as_deref(), Some(NO_LOCAL_VERSION));
}

#[tokio::test]
async fn test_required_flag_and_metadata() {
    let fixture = UpdateFixture::new();
    fixture.set_local_version("1.9.0");
    fixture.write_shared(
        "version.json",
        r#"{"version":"1.10.0","requiredUpdate":true,"updateMessage":"Carrier codes","releaseDate":"2024-06-01"}"#,
    );

    let check = checker(&fixture).check_for_updates().await.unwrap();
    assert!(check.update_available);
    assert!(check.is_required());
    let release = check.release.unwrap();
    assert_eq!(release.update_message, "Carrier codes");
    assert_eq!(release.release_date, "2024-06-01");
}
