//! Fetches a version-pinned, zstd-compressed tar of prebuilt contract
//! artifacts and extracts it into a fresh directory (§4.12). No on-disk
//! caching: every call gets its own `tempfile`-allocated unique directory.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::errors::ArtifactError;

const FORGE_ARTIFACTS_DIR: &str = "forge-artifacts";

pub struct DownloadedArtifacts {
    pub directory: tempfile::TempDir,
    pub forge_artifacts_path: PathBuf,
}

/// Downloads the tar.zst at `url`, verifies its SHA-256 against
/// `expected_sha256` (an empty string skips the check with a warning —
/// the bootstrap case for a version that has no pinned hash yet), and
/// extracts it into a fresh temporary directory.
pub async fn download_and_extract(url: &str, expected_sha256: &str) -> Result<DownloadedArtifacts, ArtifactError> {
    let response = reqwest::get(url).await?;
    let bytes = response.error_for_status()?.bytes().await?;

    if expected_sha256.is_empty() {
        warn!(url, "no pinned sha256 for this artifact version, skipping integrity check");
    } else {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        if actual != expected_sha256 {
            return Err(ArtifactError::IntegrityError { expected: expected_sha256.to_string(), actual });
        }
    }

    let directory = tempfile::tempdir()?;
    extract_tar_zst(&bytes, directory.path())?;
    let forge_artifacts_path = normalize_forge_artifacts_dir(directory.path())?;
    Ok(DownloadedArtifacts { directory, forge_artifacts_path })
}

fn extract_tar_zst(bytes: &[u8], destination: &Path) -> Result<(), ArtifactError> {
    let decoder = zstd::stream::read::Decoder::new(bytes)?;
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = entry.path()?.into_owned();
        let resolved = safe_join(destination, &relative_path)?;

        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
            set_mode(parent, 0o755)?;
        }

        let header = entry.header().clone();
        match header.entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&resolved)?;
                set_mode(&resolved, 0o755)?;
            }
            tar::EntryType::Symlink => {
                if let Some(link_name) = entry.link_name()? {
                    let target = safe_join(destination, &link_name)?;
                    let _ = std::fs::remove_file(&resolved);
                    #[cfg(unix)]
                    std::os::unix::fs::symlink(&target, &resolved)?;
                }
            }
            _ => {
                entry.unpack(&resolved)?;
                if let Ok(mode) = header.mode() {
                    set_mode(&resolved, mode)?;
                }
            }
        }
    }
    Ok(())
}

/// Rejects any entry whose resolved path would land outside `root`
/// (path-traversal defense): normalizes `..`/`.` components without
/// touching the filesystem, then checks the result still starts with
/// `root`.
fn safe_join(root: &Path, relative: &Path) -> Result<PathBuf, ArtifactError> {
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    return Err(ArtifactError::PathTraversal(relative.display().to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArtifactError::PathTraversal(relative.display().to_string()));
            }
        }
    }
    if !resolved.starts_with(root) {
        return Err(ArtifactError::PathTraversal(relative.display().to_string()));
    }
    Ok(resolved)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// The archive may place entries at its root or under a top-level
/// `forge-artifacts/`; this always returns a single `forge-artifacts/`
/// subdirectory of `root`, flattening a nested
/// `forge-artifacts/forge-artifacts/` if the archive produced one.
fn normalize_forge_artifacts_dir(root: &Path) -> Result<PathBuf, ArtifactError> {
    let top = root.join(FORGE_ARTIFACTS_DIR);
    let nested = top.join(FORGE_ARTIFACTS_DIR);
    if nested.is_dir() {
        flatten_into_parent(&nested, &top)?;
    }
    if top.is_dir() {
        return Ok(top);
    }
    std::fs::create_dir_all(&top)?;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.path() == top {
            continue;
        }
        let target = top.join(entry.file_name());
        std::fs::rename(entry.path(), target)?;
    }
    Ok(top)
}

fn flatten_into_parent(nested: &Path, parent: &Path) -> Result<(), ArtifactError> {
    for entry in std::fs::read_dir(nested)? {
        let entry = entry?;
        let target = parent.join(entry.file_name());
        std::fs::rename(entry.path(), target)?;
    }
    std::fs::remove_dir(nested)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn safe_join_rejects_parent_escape() {
        let root = Path::new("/tmp/dest");
        assert!(safe_join(root, Path::new("../../etc/passwd")).is_err());
    }

    #[test]
    fn safe_join_accepts_nested_path() {
        let root = Path::new("/tmp/dest");
        let resolved = safe_join(root, Path::new("forge-artifacts/Foo.json")).unwrap();
        assert_eq!(resolved, root.join("forge-artifacts/Foo.json"));
    }

    #[test]
    fn safe_join_rejects_absolute_entry() {
        let root = Path::new("/tmp/dest");
        assert!(safe_join(root, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn normalize_flattens_nested_forge_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("forge-artifacts/forge-artifacts");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Foo.json"), b"{}").unwrap();

        let normalized = normalize_forge_artifacts_dir(dir.path()).unwrap();
        assert_eq!(normalized, dir.path().join("forge-artifacts"));
        assert!(normalized.join("Foo.json").exists());
        assert!(!normalized.join("forge-artifacts").exists());
    }

    #[test]
    fn normalize_wraps_root_level_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Foo.json"), b"{}").unwrap();

        let normalized = normalize_forge_artifacts_dir(dir.path()).unwrap();
        assert_eq!(normalized, dir.path().join("forge-artifacts"));
        assert!(normalized.join("Foo.json").exists());
    }
}
