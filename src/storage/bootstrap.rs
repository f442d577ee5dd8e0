//! First-launch preparation of the store file.
//!
//! Both steps are best effort: failures are logged and recorded as
//! [`StartupWarning`]s, and the store is opened regardless.

use std::fs;
use std::path::Path;

use super::layout::StoreLayout;
use crate::error::StartupWarning;

/// What [`prepare`] did to the data directory.
#[derive(Debug, Default)]
pub struct Preparation {
    /// The legacy store file existed and was deleted.
    pub legacy_removed: bool,
    /// The current store was copied from the bundled template.
    pub seeded: bool,
    /// Recoverable failures encountered along the way.
    pub warnings: Vec<StartupWarning>,
}

/// Purge the legacy store and seed the current one from the template.
pub fn prepare(layout: &StoreLayout) -> Preparation {
    let mut preparation = Preparation::default();

    match remove_legacy_store(layout) {
        Ok(removed) => preparation.legacy_removed = removed,
        Err(warning) => preparation.warnings.push(warning),
    }

    match seed_from_template(layout) {
        Ok(seeded) => preparation.seeded = seeded,
        Err(warning) => preparation.warnings.push(warning),
    }

    preparation
}

/// Delete the legacy store file if present.
///
/// Returns `Ok(true)` if a file was removed.
pub fn remove_legacy_store(layout: &StoreLayout) -> Result<bool, StartupWarning> {
    let path = layout.legacy_path();
    if !exists(&path) {
        return Ok(false);
    }

    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Removed legacy store file");
            Ok(true)
        }
        Err(source) => {
            let warning = StartupWarning::LegacyRemoval { path, source };
            tracing::warn!(error = %warning, "Legacy store cleanup failed");
            Err(warning)
        }
    }
}

/// Copy the bundled template into place if no current store exists.
///
/// The copy goes through a sibling `.partial` file and is renamed into
/// place, so a failed copy never leaves a truncated store behind.
/// Returns `Ok(true)` if the template was copied.
pub fn seed_from_template(layout: &StoreLayout) -> Result<bool, StartupWarning> {
    let store_path = layout.store_path();
    if exists(&store_path) {
        tracing::debug!(path = %store_path.display(), "Store exists, skipping template seed");
        return Ok(false);
    }

    let template_path = layout.template_path();
    if !exists(&template_path) {
        let warning = StartupWarning::TemplateMissing {
            path: template_path,
        };
        tracing::warn!(error = %warning, "Starting with an empty store");
        return Err(warning);
    }

    let partial_path = store_path.with_extension("sqlite.partial");
    let copied = fs::copy(&template_path, &partial_path)
        .and_then(|_| fs::rename(&partial_path, &store_path));

    match copied {
        Ok(()) => {
            tracing::info!(
                from = %template_path.display(),
                to = %store_path.display(),
                "Seeded store from bundled template"
            );
            Ok(true)
        }
        Err(source) => {
            let _ = fs::remove_file(&partial_path);
            let warning = StartupWarning::TemplateCopy {
                from: template_path,
                to: store_path,
                source,
            };
            tracing::error!(error = %warning, "Template seed failed");
            Err(warning)
        }
    }
}

// An unreadable parent counts as absent; the following step reports the real error.
fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout_in(temp_dir: &TempDir) -> StoreLayout {
        let data_dir = temp_dir.path().join("documents");
        let bundle_dir = temp_dir.path().join("bundle");
        fs::create_dir_all(&data_dir).unwrap();
        fs::create_dir_all(&bundle_dir).unwrap();
        StoreLayout::new(data_dir, bundle_dir)
    }

    #[test]
    fn test_fresh_install_copies_template_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);
        fs::write(layout.template_path(), b"template bytes").unwrap();

        let preparation = prepare(&layout);

        assert!(preparation.seeded);
        assert!(!preparation.legacy_removed);
        assert!(preparation.warnings.is_empty());
        assert_eq!(fs::read(layout.store_path()).unwrap(), b"template bytes");
    }

    #[test]
    fn test_legacy_file_is_removed_and_store_seeded() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);
        fs::write(layout.template_path(), b"template bytes").unwrap();
        fs::write(layout.legacy_path(), b"old schema").unwrap();

        let preparation = prepare(&layout);

        assert!(preparation.legacy_removed);
        assert!(preparation.seeded);
        assert!(!layout.legacy_path().exists());
        assert_eq!(fs::read(layout.store_path()).unwrap(), b"template bytes");
    }

    #[test]
    fn test_existing_store_is_not_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);
        fs::write(layout.template_path(), b"template bytes").unwrap();
        fs::write(layout.store_path(), b"user data").unwrap();

        let preparation = prepare(&layout);

        assert!(!preparation.seeded);
        assert_eq!(fs::read(layout.store_path()).unwrap(), b"user data");
    }

    #[test]
    fn test_missing_template_is_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);

        let preparation = prepare(&layout);

        assert!(!preparation.seeded);
        assert!(matches!(
            preparation.warnings.as_slice(),
            [StartupWarning::TemplateMissing { .. }]
        ));
        assert!(!layout.store_path().exists());
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);
        // A directory where the template file should be cannot be copied.
        fs::create_dir_all(layout.template_path()).unwrap();

        let preparation = prepare(&layout);

        assert!(matches!(
            preparation.warnings.as_slice(),
            [StartupWarning::TemplateCopy { .. }]
        ));
        assert!(!layout.store_path().exists());
        assert!(!layout.store_path().with_extension("sqlite.partial").exists());
    }

    #[test]
    fn test_unremovable_legacy_entry_is_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let layout = layout_in(&temp_dir);
        fs::write(layout.template_path(), b"template bytes").unwrap();
        // remove_file refuses directories, even for root.
        fs::create_dir_all(layout.legacy_path()).unwrap();

        let preparation = prepare(&layout);

        assert!(!preparation.legacy_removed);
        assert!(matches!(
            preparation.warnings.as_slice(),
            [StartupWarning::LegacyRemoval { .. }]
        ));
        // Seeding still happens.
        assert!(preparation.seeded);
    }
}
