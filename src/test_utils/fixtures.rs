//! Temporary install/shared-drive layouts for updater tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::{ElevationMode, UpdaterConfig};

/// A throwaway installation:
///
/// ```text
/// <tmp>/app/       installed application
/// <tmp>/shared/    published release
/// <tmp>/backups/   snapshot root (created on first backup)
/// <tmp>/scripts/   generated elevation scripts
/// ```
pub struct UpdateFixture {
    pub temp: TempDir,
    pub app: PathBuf,
    pub shared: PathBuf,
    pub backups: PathBuf,
    pub scripts: PathBuf,
}

impl Default for UpdateFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        let fixture = Self {
            app: root.join("app"),
            shared: root.join("shared"),
            backups: root.join("backups"),
            scripts: root.join("scripts"),
            temp,
        };
        fs::create_dir_all(&fixture.app).expect("Failed to create app dir");
        fs::create_dir_all(&fixture.shared).expect("Failed to create shared dir");
        fixture
    }

    pub fn write_app(&self, relative: &str, content: &str) {
        write(&self.app.join(relative), content);
    }

    pub fn write_shared(&self, relative: &str, content: &str) {
        write(&self.shared.join(relative), content);
    }

    pub fn read_app(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.app.join(relative)).ok()
    }

    pub fn set_local_version(&self, version: &str) {
        self.write_app("version.json", &format!(r#"{{"version":"{version}"}}"#));
    }

    pub fn set_remote_version(&self, version: &str, required: bool) {
        self.write_shared(
            "version.json",
            &format!(r#"{{"version":"{version}","requiredUpdate":{required}}}"#),
        );
    }

    pub fn set_local_dependencies(&self, deps: &[(&str, &str)]) {
        self.write_app("package.json", &manifest(deps));
    }

    pub fn set_remote_dependencies(&self, deps: &[(&str, &str)]) {
        self.write_shared("package.json", &manifest(deps));
    }

    /// A typical 1.0.0 install with a 1.1.0 release published, same dependencies.
    pub fn with_pending_release() -> Self {
        let fixture = Self::new();
        fixture.set_local_version("1.0.0");
        fixture.set_local_dependencies(&[("mssql", "^9.1.0")]);
        fixture.write_app("src/main.js", "console.log('1.0.0')");
        fixture.write_app("src/renderer/index.html", "<h1>1.0.0</h1>");
        fixture.write_app("public/logo.txt", "logo-v1");

        fixture.set_remote_version("1.1.0", false);
        fixture.set_remote_dependencies(&[("mssql", "^9.1.0")]);
        fixture.write_shared("src/main.js", "console.log('1.1.0')");
        fixture.write_shared("src/renderer/dashboard.html", "<h1>1.1.0</h1>");
        fixture.write_shared("public/logo.txt", "logo-v2");
        fixture
    }

    /// Configuration pointing at this fixture with no delays and no real
    /// package manager.
    pub fn config(&self) -> UpdaterConfig {
        UpdaterConfig {
            app_path: Some(self.app.clone()),
            shared_drive_path: Some(self.shared.clone()),
            backup_dir: Some(self.backups.clone()),
            scripts_dir: Some(self.scripts.clone()),
            install_command: noop_command(),
            restart_delay_ms: 0,
            handoff_delay_ms: 0,
            elevation: ElevationMode::Never,
            app_executable: Some(self.temp.path().join("shipstatus-pro")),
            ..UpdaterConfig::default()
        }
    }

    /// Every file below the app directory, keyed by forward-slash relative path.
    pub fn app_tree(&self) -> BTreeMap<String, Vec<u8>> {
        tree(&self.app)
    }

    pub fn backup_names(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.backups) else {
            return Vec::new();
        };
        let mut names: Vec<String> =
            entries.flatten().map(|e| e.file_name().to_string_lossy().into_owned()).collect();
        names.sort();
        names
    }
}

pub fn tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            (relative, fs::read(e.path()).unwrap_or_default())
        })
        .collect()
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write fixture file");
}

fn manifest(deps: &[(&str, &str)]) -> String {
    let deps: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|(name, version)| (name.to_string(), serde_json::Value::String(version.to_string())))
        .collect();
    serde_json::json!({ "name": "shipstatus-pro", "dependencies": deps }).to_string()
}

#[cfg(unix)]
fn noop_command() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()]
}

#[cfg(windows)]
fn noop_command() -> Vec<String> {
    vec!["cmd".to_string(), "/C".to_string(), "exit 0".to_string()]
}
