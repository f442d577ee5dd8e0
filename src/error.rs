//! Error types for the comics store.
//!
//! Startup failures come in two tiers: [`StartupError`] aborts the open,
//! [`StartupWarning`] is recorded and startup continues.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::schema::SchemaError;

/// Unrecoverable failure while opening the store.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Unable to locate the user's documents directory")]
    DocumentsDirUnavailable,

    #[error("Unable to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to load the schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unable to attach the SQLite store at {path}: {source}")]
    Attach {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store at {path} has schema version {found}, newer than supported version {supported}")]
    IncompatibleStore {
        path: PathBuf,
        found: i64,
        supported: i64,
    },

    #[error("Failed to spawn session thread: {0}")]
    SpawnSession(#[source] std::io::Error),
}

/// Recoverable failure while preparing the store file.
///
/// The store still opens, possibly over a fresh, empty database.
#[derive(Debug, Error)]
pub enum StartupWarning {
    #[error("Error removing old SQLite file at {path}: {source}")]
    LegacyRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The SQLite database does not exist, and no bundled template was found at {path}")]
    TemplateMissing { path: PathBuf },

    #[error("The SQLite database does not exist, and the bundled template at {from} could not be copied to {to}: {source}")]
    TemplateCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    ChannelClosed,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid comic: {0}")]
    InvalidComic(String),

    #[error("Session thread panicked")]
    ThreadPanic,
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Database(e.to_string())
    }
}
