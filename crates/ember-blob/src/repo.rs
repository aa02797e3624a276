//! On-disk blob save/exists/delete, with secure erase (multi-pass random
//! overwrite + fsync) before unlink. Best-effort: on copy-on-write
//! filesystems in-place overwrite does not guarantee physical erasure, but
//! the work is always performed and its completion logged.

use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Errors from repository operations. Wraps the underlying I/O error with
/// the path it occurred on, for operator-facing logs.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("I/O error at {path}: {source}")]
    Io { path: String, #[source] source: io::Error },
}

fn wrap(path: &Path, source: io::Error) -> RepoError {
    RepoError::Io { path: path.display().to_string(), source }
}

/// Saves, checks for, and securely deletes blobs under a configured number
/// of overwrite passes.
#[derive(Debug, Clone, Copy)]
pub struct BlobRepository {
    shred_passes: u32,
}

impl BlobRepository {
    #[must_use]
    pub fn new(shred_passes: u32) -> Self {
        Self { shred_passes: shred_passes.max(1) }
    }

    /// Write `bytes` to `path`, creating parent directories as needed.
    /// Write-then-close is sufficient; this is not a crash-consistent store.
    pub fn save(&self, bytes: &[u8], path: &Path) -> Result<(), RepoError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| wrap(parent, e))?;
        }
        fs::write(path, bytes).map_err(|e| wrap(path, e))?;
        tracing::info!(path = %path.display(), "file_saved");
        Ok(())
    }

    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Secure-erase then unlink a single file. A no-op returning `Ok(())`
    /// if the file is already absent.
    pub fn delete(&self, path: &Path) -> Result<(), RepoError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "file_does_not_exist");
            return Ok(());
        }
        secure_erase(path, self.shred_passes)?;
        fs::remove_file(path).map_err(|e| wrap(path, e))?;
        tracing::info!(path = %path.display(), passes = self.shred_passes, "file_deleted");
        Ok(())
    }

    /// Secure-erase every regular file under `dir`, then remove the tree.
    /// A no-op returning `Ok(())` if the directory is already absent.
    pub fn delete_directory(&self, dir: &Path) -> Result<(), RepoError> {
        if !dir.exists() {
            tracing::warn!(directory = %dir.display(), "directory_does_not_exist");
            return Ok(());
        }

        shred_tree(dir, self.shred_passes)?;
        fs::remove_dir_all(dir).map_err(|e| wrap(dir, e))?;
        tracing::info!(directory = %dir.display(), "directory_deleted");
        Ok(())
    }
}

fn shred_tree(dir: &Path, passes: u32) -> Result<(), RepoError> {
    for entry in fs::read_dir(dir).map_err(|e| wrap(dir, e))? {
        let entry = entry.map_err(|e| wrap(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| wrap(&path, e))?;
        if file_type.is_dir() {
            shred_tree(&path, passes)?;
        } else if file_type.is_file() {
            secure_erase(&path, passes)?;
        }
    }
    Ok(())
}

fn secure_erase(path: &Path, passes: u32) -> Result<(), RepoError> {
    let len = fs::metadata(path).map_err(|e| wrap(path, e))?.len();
    let mut file = OpenOptions::new().write(true).open(path).map_err(|e| wrap(path, e))?;

    let mut buf = vec![0u8; usize::try_from(len).unwrap_or(usize::MAX)];
    for _ in 0..passes {
        rand::rngs::OsRng.fill_bytes(&mut buf);
        file.seek(SeekFrom::Start(0)).map_err(|e| wrap(path, e))?;
        file.write_all(&buf).map_err(|e| wrap(path, e))?;
        file.sync_all().map_err(|e| wrap(path, e))?;
    }
    tracing::debug!(path = %path.display(), passes, "secure_erase_complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = BlobRepository::new(1);
        let path = dir.path().join("sub").join("file.bin");

        repo.save(b"top secret", &path).unwrap();
        assert!(repo.exists(&path));

        repo.delete(&path).unwrap();
        assert!(!repo.exists(&path));
    }

    #[test]
    fn delete_is_idempotent_on_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = BlobRepository::new(1);
        let path = dir.path().join("nope.bin");
        assert!(repo.delete(&path).is_ok());
    }

    #[test]
    fn delete_directory_removes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = BlobRepository::new(2);
        let upload_dir = dir.path().join("alpha-beta-gamma");
        repo.save(b"contents", &upload_dir.join("doc.pdf")).unwrap();

        assert!(upload_dir.exists());
        repo.delete_directory(&upload_dir).unwrap();
        assert!(!upload_dir.exists());
    }

    #[test]
    fn delete_directory_is_idempotent_on_absent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = BlobRepository::new(1);
        assert!(repo.delete_directory(&dir.path().join("ghost")).is_ok());
    }
}
