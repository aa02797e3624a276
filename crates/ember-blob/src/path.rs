//! Maps an identifier and a sanitized filename onto an on-disk path.

use std::io;
use std::path::{Path, PathBuf};

/// Owns the blob base directory layout: `<base>/<identifier>/<filename>`,
/// with a sibling `<base>/temp/` for staging.
#[derive(Debug, Clone)]
pub struct PathManager {
    base: PathBuf,
    temp: PathBuf,
}

impl PathManager {
    /// Create the base and temp directories if they don't already exist.
    pub fn new(base: impl Into<PathBuf>) -> io::Result<Self> {
        let base = base.into();
        let temp = base.join("temp");
        std::fs::create_dir_all(&base)?;
        std::fs::create_dir_all(&temp)?;
        tracing::info!(base = %base.display(), "storage_directories_ready");
        Ok(Self { base, temp })
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn upload_dir(&self, identifier: &str) -> PathBuf {
        self.base.join(identifier)
    }

    #[must_use]
    pub fn file_path(&self, identifier: &str, filename: &str) -> PathBuf {
        self.upload_dir(identifier).join(filename)
    }

    #[must_use]
    pub fn temp_path(&self, temp_id: &str) -> PathBuf {
        self.temp.join(temp_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_base_and_temp_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("uploads");
        let pm = PathManager::new(&base).unwrap();
        assert!(pm.base().is_dir());
        assert!(base.join("temp").is_dir());
    }

    #[test]
    fn file_path_nests_under_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let pm = PathManager::new(dir.path()).unwrap();
        let p = pm.file_path("alpha-beta-gamma", "doc.pdf");
        assert_eq!(p, dir.path().join("alpha-beta-gamma").join("doc.pdf"));
    }
}
