//! Dependency manifest diffing and the post-update install step.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::UpdaterError;
use crate::updater::progress::{ProgressEvent, ProgressListener, ProgressStatus};

/// The part of `package.json` the updater looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A dependency that is new or pinned differently in the newer manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyChange {
    pub name: String,
    pub version: String,
    pub dev: bool,
}

/// Entries of `new` that are missing from `old` or differ from it.
///
/// Entries only present in `old` are not reported: removing a package never
/// requires an install.
pub fn changed_dependencies(old: &PackageManifest, new: &PackageManifest) -> Vec<DependencyChange> {
    let diff = |old: &BTreeMap<String, String>, new: &BTreeMap<String, String>, dev: bool| {
        new.iter()
            .filter(|(name, version)| old.get(*name) != Some(*version))
            .map(|(name, version)| DependencyChange {
                name: name.clone(),
                version: version.clone(),
                dev,
            })
            .collect::<Vec<_>>()
    };

    let mut changes = diff(&old.dependencies, &new.dependencies, false);
    changes.extend(diff(&old.dev_dependencies, &new.dev_dependencies, true));
    changes
}

pub struct DependencyManager {
    app_path: PathBuf,
    command: Vec<String>,
    listener: Arc<dyn ProgressListener>,
}

impl DependencyManager {
    pub fn new(app_path: PathBuf, command: Vec<String>, listener: Arc<dyn ProgressListener>) -> Self {
        Self {
            app_path,
            command,
            listener,
        }
    }

    fn emit(&self, status: ProgressStatus, message: impl Into<String>) {
        self.listener.on_progress(&ProgressEvent::new(status, message));
    }

    /// Whether an install is needed going from the manifest at `old` to the one at `new`.
    ///
    /// Missing or unreadable manifests count as a change.
    pub async fn dependencies_need_update(&self, old: &Path, new: &Path) -> bool {
        if !old.is_file() || !new.is_file() {
            debug!("Dependency manifest missing, assuming dependencies changed");
            return true;
        }

        let (old_manifest, new_manifest) =
            match (PackageManifest::load(old).await, PackageManifest::load(new).await) {
                (Ok(before), Ok(after)) => (before, after),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Error checking dependencies: {:#}", e);
                    return true;
                }
            };

        let changes = changed_dependencies(&old_manifest, &new_manifest);
        for change in &changes {
            let kind = if change.dev { "Dev dependency" } else { "Dependency" };
            info!("{} change detected: {}@{}", kind, change.name, change.version);
        }
        !changes.is_empty()
    }

    /// Run the install command in the application directory.
    ///
    /// Output is relayed chunk by chunk as `dependencies` progress events.
    pub async fn install_dependencies(&self) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(UpdaterError::ConfigError {
                message: "install_command is empty".to_string(),
            }
            .into());
        };
        let command_line = self.command.join(" ");

        info!("Starting {}", command_line);
        self.emit(ProgressStatus::Dependencies, "Installing dependencies...");

        let resolved = which::which_in(program, std::env::var_os("PATH"), &self.app_path)
            .map_err(|e| self.launch_failed(program, e.to_string()))?;
        debug!("Resolved {} to {}", program, resolved.display());

        let mut child = Command::new(&resolved)
            .args(args)
            .current_dir(&self.app_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_failed(program, e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, error_output, status) =
            tokio::join!(self.relay(stdout, "output"), self.relay(stderr, "error"), child.wait());

        let status = status.map_err(|e| self.launch_failed(program, e.to_string()))?;
        if status.success() {
            info!("{} completed successfully", command_line);
            self.emit(ProgressStatus::Dependencies, "Dependencies installed successfully");
            return Ok(());
        }

        let code = status.code().unwrap_or(-1);
        warn!("{} failed with code {}", command_line, code);
        self.emit(ProgressStatus::Error, format!("Failed to install dependencies (code {code})"));
        Err(UpdaterError::InstallFailed {
            command: command_line,
            code,
            stderr: error_output,
        }
        .into())
    }

    fn launch_failed(&self, program: &str, reason: String) -> anyhow::Error {
        warn!("{} process error: {}", program, reason);
        self.emit(ProgressStatus::Error, format!("Error running {program}: {reason}"));
        UpdaterError::InstallLaunchFailed {
            command: program.to_string(),
            reason,
        }
        .into()
    }

    /// Forward each chunk read from `reader` and return everything read.
    async fn relay<R: AsyncRead + Unpin>(&self, reader: Option<R>, stream: &str) -> String {
        let mut collected = String::new();
        let Some(mut reader) = reader else {
            return collected;
        };

        let mut buf = vec![0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]);
                    debug!("install {}: {}", stream, chunk.trim_end());
                    self.emit(
                        ProgressStatus::Dependencies,
                        format!("Installing dependencies: {}", last_line(&chunk)),
                    );
                    collected.push_str(&chunk);
                }
                Err(e) => {
                    warn!("Failed to read install {}: {}", stream, e);
                    break;
                }
            }
        }
        collected
    }
}

fn last_line(chunk: &str) -> &str {
    chunk.trim().lines().last().map(str::trim).filter(|l| !l.is_empty()).unwrap_or("Processing...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn manifest(deps: &[(&str, &str)], dev: &[(&str, &str)]) -> PackageManifest {
        PackageManifest {
            dependencies: map(deps),
            dev_dependencies: map(dev),
        }
    }

    #[test]
    fn test_added_and_changed_entries_count() {
        let old = manifest(&[("mssql", "^9.1.0")], &[]);
        let added = manifest(&[("mssql", "^9.1.0"), ("chart.js", "^4.4.0")], &[]);
        let bumped = manifest(&[("mssql", "^10.0.0")], &[]);

        assert_eq!(
            changed_dependencies(&old, &added),
            vec![DependencyChange {
                name: "chart.js".to_string(),
                version: "^4.4.0".to_string(),
                dev: false,
            }]
        );
        assert_eq!(changed_dependencies(&old, &bumped).len(), 1);
    }

    #[test]
    fn test_removed_entries_do_not_count() {
        let old = manifest(&[("mssql", "^9.1.0"), ("lodash", "4.17.21")], &[("jest", "29")]);
        let new = manifest(&[("mssql", "^9.1.0")], &[]);
        assert!(changed_dependencies(&old, &new).is_empty());
    }

    #[test]
    fn test_dev_dependencies_are_compared() {
        let old = manifest(&[], &[("electron", "28.0.0")]);
        let new = manifest(&[], &[("electron", "29.0.0")]);
        let changes = changed_dependencies(&old, &new);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].dev);
    }

    #[test]
    fn test_manifest_without_sections() {
        let parsed: PackageManifest = serde_json::from_str(r#"{"name":"shipstatus"}"#).unwrap();
        assert_eq!(parsed, PackageManifest::default());
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("added 3 packages\nfound 0 vulnerabilities\n"), "found 0 vulnerabilities");
        assert_eq!(last_line("   \n\n"), "Processing...");
        assert_eq!(last_line("single"), "single");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_failure_names_full_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let command = vec!["sh".to_string(), "-c".to_string(), "echo lockfile busy >&2; exit 4".to_string()];
        let manager = DependencyManager::new(
            temp.path().to_path_buf(),
            command,
            Arc::new(crate::updater::progress::NoopListener),
        );

        let err = manager.install_dependencies().await.unwrap_err();
        match err.downcast_ref::<UpdaterError>() {
            Some(UpdaterError::InstallFailed {
                command,
                code,
                stderr,
            }) => {
                assert_eq!(command, "sh -c echo lockfile busy >&2; exit 4");
                assert_eq!(*code, 4);
                assert!(stderr.contains("lockfile busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
