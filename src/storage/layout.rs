//! Filesystem layout of the store.
//!
//! Everything lives directly in the per-user data directory:
//! - `comics.sqlite` - the current store
//! - `xkcd.sqlite` - store from previous versions, purged on startup
//!
//! The template `comics.sqlite` lives in the bundle directory shipped
//! with the application.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StartupError;

/// Filename of the store written by previous versions.
pub const LEGACY_STORE_FILE: &str = "xkcd.sqlite";

/// Filename of the current store.
pub const STORE_FILE: &str = "comics.sqlite";

/// Filename of the pre-populated template in the bundle directory.
pub const TEMPLATE_FILE: &str = "comics.sqlite";

/// Returns the platform documents directory for the current user.
pub fn documents_dir() -> Option<PathBuf> {
    dirs::document_dir()
}

/// Resolved paths for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    data_dir: PathBuf,
    bundle_dir: PathBuf,
}

impl StoreLayout {
    /// Build a layout over explicit directories without touching the filesystem.
    pub fn new(data_dir: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Resolve the data directory and make sure it exists.
    ///
    /// Uses `data_dir` when given, otherwise the user's documents directory.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::DocumentsDirUnavailable`] if no directory can be
    /// determined, or [`StartupError::CreateDir`] if it cannot be created.
    pub fn resolve(data_dir: Option<&Path>, bundle_dir: &Path) -> Result<Self, StartupError> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => documents_dir().ok_or(StartupError::DocumentsDirUnavailable)?,
        };

        fs::create_dir_all(&data_dir).map_err(|source| StartupError::CreateDir {
            path: data_dir.clone(),
            source,
        })?;

        Ok(Self::new(data_dir, bundle_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_STORE_FILE)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn template_path(&self) -> PathBuf {
        self.bundle_dir.join(TEMPLATE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_under_their_directories() {
        let layout = StoreLayout::new("/data", "/bundle");

        assert_eq!(layout.legacy_path(), PathBuf::from("/data/xkcd.sqlite"));
        assert_eq!(layout.store_path(), PathBuf::from("/data/comics.sqlite"));
        assert_eq!(layout.template_path(), PathBuf::from("/bundle/comics.sqlite"));
    }

    #[test]
    fn test_resolve_creates_missing_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested").join("documents");

        let layout = StoreLayout::resolve(Some(&data_dir), temp_dir.path()).unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(layout.data_dir(), data_dir.as_path());
    }

    #[test]
    fn test_resolve_fails_when_data_dir_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let result = StoreLayout::resolve(Some(&blocker.join("documents")), temp_dir.path());

        assert!(matches!(result, Err(StartupError::CreateDir { .. })));
    }
}
