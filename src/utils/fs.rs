//! File system utilities for backup, mirror and rollback operations
//!
//! The updater only needs a handful of primitives, but they all have to behave
//! the same way on Windows, macOS and Linux:
//!
//! - **Mirror copies**: [`mirror_dir`] empties the destination before copying so
//!   files removed from a release do not survive an update
//! - **Atomic writes**: [`atomic_write`] writes metadata through a temp file + rename
//! - **Digests**: [`tree_digest`] hashes a whole tree (paths and contents) so a
//!   snapshot can be compared against what was restored
//!
//! The blocking implementations walk trees with `walkdir`; the `_async` variants run
//! them on tokio's blocking pool.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Existing files in `dst` are overwritten, other files are left alone. Symlinks
/// are recreated with the same target rather than followed.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", src.display()))?;
        let relative = entry.path().strip_prefix(src).with_context(|| {
            format!("Entry {} escaped {}", entry.path().display(), src.display())
        })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }

    Ok(())
}

/// Recreate the link at `src` as `dst`, replacing whatever `dst` was.
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link_target =
        fs::read_link(src).with_context(|| format!("Failed to read link: {}", src.display()))?;
    if fs::symlink_metadata(dst).is_ok() {
        remove_path(dst)?;
    }
    create_symlink(src, &link_target, dst).with_context(|| {
        format!("Failed to create link {} -> {}", dst.display(), link_target.display())
    })
}

#[cfg(unix)]
fn create_symlink(_src: &Path, link_target: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(link_target, dst)
}

#[cfg(windows)]
fn create_symlink(src: &Path, link_target: &Path, dst: &Path) -> std::io::Result<()> {
    // Windows distinguishes file and directory links; dangling links become file links
    if fs::metadata(src).is_ok_and(|m| m.is_dir()) {
        std::os::windows::fs::symlink_dir(link_target, dst)
    } else {
        std::os::windows::fs::symlink_file(link_target, dst)
    }
}

/// Remove every entry inside `path`, creating the directory if it does not exist.
pub fn empty_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return ensure_dir(path);
    }

    for entry in
        fs::read_dir(path).with_context(|| format!("Failed to read directory: {}", path.display()))?
    {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

/// Replace the contents of `dst` with the contents of `src`.
pub fn mirror_dir(src: &Path, dst: &Path) -> Result<()> {
    empty_dir(dst)?;
    copy_dir(src, dst)
}

/// Remove a file, directory or symlink if it exists. Links are removed, never followed.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    } else if metadata.is_symlink() && cfg!(windows) && fs::metadata(path).is_ok_and(|m| m.is_dir()) {
        fs::remove_dir(path)
            .with_context(|| format!("Failed to remove link: {}", path.display()))?;
    } else {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

pub fn calculate_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 over every relative path and file content below `path`.
///
/// For a plain file this is the checksum of its content. Two trees have the same
/// digest exactly when they contain the same directories, byte-identical files and
/// symlinks with the same targets.
pub fn tree_digest(path: &Path) -> Result<String> {
    if path.is_file() {
        return calculate_checksum(path);
    }

    let mut hasher = Sha256::new();
    for entry in WalkDir::new(path).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        let relative = entry
            .path()
            .strip_prefix(path)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        if entry.file_type().is_dir() {
            hasher.update(format!("d:{relative}\0").as_bytes());
        } else if entry.file_type().is_symlink() {
            let link_target = fs::read_link(entry.path()).with_context(|| {
                format!("Failed to read link for digest: {}", entry.path().display())
            })?;
            hasher.update(format!("l:{relative}:{}\0", link_target.display()).as_bytes());
        } else if entry.file_type().is_file() {
            let content = fs::read(entry.path()).with_context(|| {
                format!("Failed to read file for digest: {}", entry.path().display())
            })?;
            hasher.update(format!("f:{relative}:{}\0", content.len()).as_bytes());
            hasher.update(&content);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

pub async fn mirror_dir_async(src: &Path, dst: &Path) -> Result<()> {
    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || mirror_dir(&src, &dst))
        .await
        .context("Failed to join mirror copy task")?
}

pub async fn copy_dir_async(src: &Path, dst: &Path) -> Result<()> {
    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || copy_dir(&src, &dst))
        .await
        .context("Failed to join directory copy task")?
}

pub async fn remove_path_async(path: &Path) -> Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || remove_path(&path))
        .await
        .context("Failed to join removal task")?
}

pub async fn tree_digest_async(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || tree_digest(&path))
        .await
        .context("Failed to join digest task")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_copy_dir_nested() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src.join("main/app.js"), "console.log(1)");
        write(&src.join("index.html"), "<html>");

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("main/app.js")).unwrap(), "console.log(1)");
        assert_eq!(fs::read_to_string(dst.join("index.html")).unwrap(), "<html>");
    }

    #[test]
    fn test_mirror_dir_removes_stale_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("remote");
        let dst = temp.path().join("local");
        write(&src.join("new.js"), "new");
        write(&dst.join("stale.js"), "old");
        write(&dst.join("nested/stale.css"), "old");

        mirror_dir(&src, &dst).unwrap();

        assert!(dst.join("new.js").exists());
        assert!(!dst.join("stale.js").exists());
        assert!(!dst.join("nested").exists());
    }

    #[test]
    fn test_empty_dir_creates_missing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("missing");
        empty_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_tree_digest_detects_changes() {
        let temp = TempDir::new().unwrap();
        let tree = temp.path().join("tree");
        write(&tree.join("a.txt"), "alpha");
        write(&tree.join("sub/b.txt"), "beta");

        let before = tree_digest(&tree).unwrap();
        assert_eq!(before, tree_digest(&tree).unwrap());

        write(&tree.join("sub/b.txt"), "beta2");
        assert_ne!(before, tree_digest(&tree).unwrap());

        write(&tree.join("sub/b.txt"), "beta");
        assert_eq!(before, tree_digest(&tree).unwrap());

        write(&tree.join("c.txt"), "");
        assert_ne!(before, tree_digest(&tree).unwrap());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deep/dir/file.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_mirror_dir_keeps_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("snapshot");
        write(&src.join("main.js"), "main");
        write(&src.join("lib/util.js"), "util");
        std::os::unix::fs::symlink("main.js", src.join("current.js")).unwrap();
        std::os::unix::fs::symlink("lib", src.join("lib-link")).unwrap();
        std::os::unix::fs::symlink("gone.js", src.join("dangling.js")).unwrap();

        let dst = temp.path().join("local");
        write(&dst.join("current.js"), "a plain file that should become a link");
        mirror_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_link(dst.join("current.js")).unwrap(), Path::new("main.js"));
        assert_eq!(fs::read_link(dst.join("lib-link")).unwrap(), Path::new("lib"));
        assert_eq!(fs::read_link(dst.join("dangling.js")).unwrap(), Path::new("gone.js"));
        assert_eq!(fs::read_to_string(dst.join("lib/util.js")).unwrap(), "util");
        assert_eq!(tree_digest(&src).unwrap(), tree_digest(&dst).unwrap());

        // emptying removes links without touching their targets
        let outside = temp.path().join("outside");
        write(&outside.join("keep.txt"), "keep");
        std::os::unix::fs::symlink(&outside, dst.join("outside-link")).unwrap();
        empty_dir(&dst).unwrap();
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
        assert!(outside.join("keep.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_tree_digest_covers_link_targets() {
        let temp = TempDir::new().unwrap();
        let tree = temp.path().join("tree");
        write(&tree.join("a.js"), "a");
        write(&tree.join("b.js"), "b");
        std::os::unix::fs::symlink("a.js", tree.join("current.js")).unwrap();
        let before = tree_digest(&tree).unwrap();

        fs::remove_file(tree.join("current.js")).unwrap();
        std::os::unix::fs::symlink("b.js", tree.join("current.js")).unwrap();
        assert_ne!(before, tree_digest(&tree).unwrap());
    }
}
