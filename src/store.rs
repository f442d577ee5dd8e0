//! The Store Handle.
//!
//! [`Store::open`] runs the whole initializer: resolve the data directory,
//! load the schema, purge the legacy file, seed from the template, attach
//! the store and bind the session thread. [`Store::prepare`] stops before
//! the attach so the caller can refuse a degraded start.
//!
//! The host owns the returned [`Store`] and hands out [`SessionHandle`]s to
//! whatever needs the data.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StartupError, StartupWarning};
use crate::lifecycle::{self, FinalFlush};
use crate::storage::bootstrap;
use crate::storage::layout::StoreLayout;
use crate::storage::schema::{self, Schema};
use crate::storage::session::{Persist, SaveOutcome, SessionHandle, SessionThread};

/// Library-level options for opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Data directory; `None` means the user's documents directory.
    pub data_dir: Option<PathBuf>,
    /// Directory holding the bundled template.
    pub bundle_dir: PathBuf,
    /// Capacity of the session command channel.
    pub channel_size: usize,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            bundle_dir: PathBuf::from("./resources"),
            channel_size: 64,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoreOptions {
    /// Options for a store in `data_dir` seeded from `bundle_dir`.
    pub fn in_dirs(data_dir: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            bundle_dir: bundle_dir.into(),
            ..Self::default()
        }
    }
}

/// What happened while opening the store.
#[derive(Debug)]
pub struct StartupReport {
    pub store_path: PathBuf,
    pub legacy_removed: bool,
    pub seeded: bool,
    pub warnings: Vec<StartupWarning>,
}

impl StartupReport {
    /// True if a recoverable step failed and the store may be missing its
    /// default data.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A successfully opened store and its startup report.
#[derive(Debug)]
pub struct Opened {
    pub store: Store,
    pub report: StartupReport,
}

/// A data directory ready to be attached.
#[derive(Debug)]
pub struct Prepared {
    layout: StoreLayout,
    schema: Schema,
    report: StartupReport,
    channel_size: usize,
    busy_timeout: Duration,
}

impl Prepared {
    pub fn report(&self) -> &StartupReport {
        &self.report
    }

    /// Attach the store file and bind the session thread.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] if the file cannot be attached or the
    /// session thread cannot start.
    pub fn attach(self) -> Result<Opened, StartupError> {
        let conn = schema::attach(&self.report.store_path, &self.schema, self.busy_timeout)?;
        let thread = SessionThread::spawn(conn, self.channel_size)?;

        tracing::info!(
            path = %self.report.store_path.display(),
            seeded = self.report.seeded,
            legacy_removed = self.report.legacy_removed,
            warnings = self.report.warnings.len(),
            "Store opened"
        );

        Ok(Opened {
            store: Store {
                layout: self.layout,
                schema: self.schema,
                thread,
            },
            report: self.report,
        })
    }
}

/// The open store: one backing file, its schema and the single session.
pub struct Store {
    layout: StoreLayout,
    schema: Schema,
    thread: SessionThread,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("layout", &self.layout)
            .field("schema_version", &self.schema.version())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open the store, preparing the data directory on first launch.
    ///
    /// Equivalent to [`Store::prepare`] followed by [`Prepared::attach`].
    pub fn open(options: &StoreOptions) -> Result<Opened, StartupError> {
        Self::prepare(options)?.attach()
    }

    /// Run the file steps of startup without opening the store.
    ///
    /// Resolves the data directory, loads the schema, purges the legacy file
    /// and seeds from the template. The caller can inspect
    /// [`Prepared::report`] and decide whether to go on.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] if the directory cannot be resolved or the
    /// schema is invalid. Legacy-purge and template-seed failures are not
    /// errors; they are listed in [`StartupReport::warnings`].
    pub fn prepare(options: &StoreOptions) -> Result<Prepared, StartupError> {
        let layout = StoreLayout::resolve(options.data_dir.as_deref(), &options.bundle_dir)?;
        let schema = Schema::load()?;

        let preparation = bootstrap::prepare(&layout);

        Ok(Prepared {
            report: StartupReport {
                store_path: layout.store_path(),
                legacy_removed: preparation.legacy_removed,
                seeded: preparation.seeded,
                warnings: preparation.warnings,
            },
            layout,
            schema,
            channel_size: options.channel_size,
            busy_timeout: Duration::from_millis(options.busy_timeout_ms),
        })
    }

    /// A handle to the store's single session.
    pub fn session(&self) -> SessionHandle {
        self.thread.handle()
    }

    pub fn data_dir(&self) -> &Path {
        self.layout.data_dir()
    }

    pub fn store_path(&self) -> PathBuf {
        self.layout.store_path()
    }

    pub fn schema_version(&self) -> i64 {
        self.schema.version()
    }

    /// Save pending changes, logging instead of failing.
    ///
    /// Returns `None` if the save failed. The process carries on either way.
    pub async fn save(&self) -> Option<SaveOutcome> {
        save_or_log(&self.session()).await
    }

    /// Run the termination hook and stop the session thread.
    ///
    /// The caller should exit with [`FinalFlush::exit_status`].
    pub async fn shutdown(self) -> FinalFlush {
        let outcome = lifecycle::run_termination_hook(&self.thread.handle()).await;

        if let Err(e) = self.thread.close().await {
            tracing::error!(error = %e, "Session thread did not stop cleanly");
            if !outcome.is_failure() {
                return FinalFlush::Failed(e);
            }
        }

        outcome
    }
}

/// Save through `target`; on failure log and carry on.
pub async fn save_or_log<P: Persist + ?Sized>(target: &P) -> Option<SaveOutcome> {
    match target.save().await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "Could not save store changes");
            None
        }
    }
}
