//! Test utilities for comics store tests.
//!
//! Provides:
//! - Temporary documents and bundle directories
//! - Template fixtures
//! - File snapshot helpers

#![allow(dead_code)]

use comics_store::observability::tracing::init_test_tracing;
use comics_store::storage::layout::{LEGACY_STORE_FILE, STORE_FILE, TEMPLATE_FILE};
use comics_store::storage::schema::{write_template, Schema};
use comics_store::{Comic, Opened, Store, StoreOptions};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tempfile::TempDir;

/// Test fixture that manages temporary documents and bundle directories.
///
/// The directories are automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Root of the temporary tree
    pub temp_dir: TempDir,
    /// Per-user data directory
    pub documents_dir: PathBuf,
    /// Application bundle directory
    pub bundle_dir: PathBuf,
}

impl TestFixture {
    /// Create a fixture with empty documents and bundle directories.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let documents_dir = temp_dir.path().join("documents");
        let bundle_dir = temp_dir.path().join("bundle");
        fs::create_dir_all(&documents_dir).expect("failed to create documents dir");
        fs::create_dir_all(&bundle_dir).expect("failed to create bundle dir");
        Self {
            temp_dir,
            documents_dir,
            bundle_dir,
        }
    }

    /// Create a fixture whose bundle carries a template with `comics`.
    pub fn with_template(comics: &[Comic]) -> Self {
        let fixture = Self::new();
        fixture.write_template(comics);
        fixture
    }

    pub fn store_path(&self) -> PathBuf {
        self.documents_dir.join(STORE_FILE)
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.documents_dir.join(LEGACY_STORE_FILE)
    }

    pub fn template_path(&self) -> PathBuf {
        self.bundle_dir.join(TEMPLATE_FILE)
    }

    pub fn options(&self) -> StoreOptions {
        let mut options = StoreOptions::in_dirs(&self.documents_dir, &self.bundle_dir);
        options.channel_size = 4;
        options.busy_timeout_ms = 100;
        options
    }

    pub fn open(&self) -> Opened {
        Store::open(&self.options()).expect("failed to open store")
    }

    /// Write a schema-initialized template pre-populated with `comics`.
    pub fn write_template(&self, comics: &[Comic]) {
        let path = self.template_path();
        write_template(&path, &Schema::load().unwrap()).expect("failed to write template");

        let conn = rusqlite::Connection::open(&path).unwrap();
        for comic in comics {
            comics_store::storage::comic::upsert(&conn, comic).unwrap();
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents and modification time of a file.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    pub modified: SystemTime,
}

impl Snapshot {
    pub fn take(path: &std::path::Path) -> Self {
        let bytes = fs::read(path).expect("failed to read file");
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .expect("failed to read mtime");
        Self { bytes, modified }
    }
}

/// A sample set of comics.
pub fn sample_comics() -> Vec<Comic> {
    let mut barrel = Comic::new(1, "Barrel - Part 1");
    barrel.title_text = Some("Don't we all.".into());
    barrel.image_url = Some("https://imgs.xkcd.com/comics/barrel_cropped_(1).jpg".into());

    let mut mom = Comic::new(327, "Exploits of a Mom");
    mom.title_text =
        Some("Her daughter is named Help I'm trapped in a driver's license factory.".into());

    vec![barrel, Comic::new(2, "Petit Trees (sketch)"), mom]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_directories() {
        let fixture = TestFixture::new();
        assert!(fixture.documents_dir.is_dir());
        assert!(fixture.bundle_dir.is_dir());
        assert!(!fixture.store_path().exists());
    }
}
