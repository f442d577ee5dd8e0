//! Schema description and store attach.
//!
//! The schema is versioned through SQLite's `user_version` header field:
//! - 0: unversioned; the schema is created unless the tables already exist
//! - 1..=SCHEMA_VERSION: compatible, tables are ensured
//! - greater: written by a newer release, refused
//!
//! A store that already carries the current version, or an unversioned one
//! that already has every required table, is opened without writing to it.

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::StartupError;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Tables every valid schema must define.
const REQUIRED_TABLES: &[&str] = &["comics"];

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS comics (
    number      INTEGER PRIMARY KEY CHECK (number >= 1),
    name        TEXT    NOT NULL,
    title_text  TEXT,
    transcript  TEXT,
    image_url   TEXT,
    explanation TEXT,
    loading     INTEGER NOT NULL DEFAULT 0
);
"#;

/// Error type for schema loading.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema SQL is empty")]
    Empty,

    #[error("schema version must be positive, got {0}")]
    InvalidVersion(i64),

    #[error("schema SQL does not execute: {0}")]
    Invalid(#[from] rusqlite::Error),

    #[error("schema does not define required table `{0}`")]
    MissingTable(&'static str),

    #[error("template target {0} already exists")]
    TemplateExists(PathBuf),
}

/// A validated, versioned schema.
#[derive(Debug, Clone)]
pub struct Schema {
    version: i64,
    sql: String,
}

impl Schema {
    /// Load the schema compiled into this crate.
    pub fn load() -> Result<Self, SchemaError> {
        Self::from_sql(SCHEMA_VERSION, SCHEMA_SQL)
    }

    /// Build a schema from SQL, validating it against an in-memory database.
    pub fn from_sql(version: i64, sql: impl Into<String>) -> Result<Self, SchemaError> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(SchemaError::Empty);
        }
        if version < 1 {
            return Err(SchemaError::InvalidVersion(version));
        }

        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&sql)?;
        if let Some(table) = missing_table(&conn)? {
            return Err(SchemaError::MissingTable(table));
        }

        Ok(Self { version, sql })
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Create the schema on `conn` and stamp its version, in one transaction.
    pub fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&format!(
            "BEGIN;\n{}\nPRAGMA user_version = {};\nCOMMIT;",
            self.sql, self.version
        ))
    }
}

/// First required table that `conn` does not define, if any.
fn missing_table(conn: &Connection) -> rusqlite::Result<Option<&'static str>> {
    for table in REQUIRED_TABLES {
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )?;
        if !found {
            return Ok(Some(*table));
        }
    }
    Ok(None)
}

/// Read the schema version stamped in the store header.
pub fn stored_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Apply per-connection pragmas. None of these write to the file.
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

/// Open the store file read/write and bring it to `schema`.
///
/// Creates the file if it does not exist. A file already at the schema's
/// version is left untouched, and so is an unversioned file (a template
/// built outside `make-template`) that already defines every required table.
///
/// # Errors
///
/// [`StartupError::Attach`] if the file cannot be opened or is not a SQLite
/// database, [`StartupError::IncompatibleStore`] if it was written by a newer
/// schema version.
pub fn attach(
    path: &Path,
    schema: &Schema,
    busy_timeout: Duration,
) -> Result<Connection, StartupError> {
    let attach_err = |source: rusqlite::Error| StartupError::Attach {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(attach_err)?;
    apply_pragmas(&conn, busy_timeout).map_err(attach_err)?;

    let found = stored_version(&conn).map_err(attach_err)?;
    if found > schema.version() {
        return Err(StartupError::IncompatibleStore {
            path: path.to_path_buf(),
            found,
            supported: schema.version(),
        });
    }
    if found == 0 && missing_table(&conn).map_err(attach_err)?.is_none() {
        tracing::info!(path = %path.display(), "Using unversioned store as-is");
        return Ok(conn);
    }
    if found < schema.version() {
        tracing::info!(
            path = %path.display(),
            from = found,
            to = schema.version(),
            "Initializing store schema"
        );
        schema.apply(&conn).map_err(attach_err)?;
    }

    Ok(conn)
}

/// Write an empty, schema-initialized store to `path`, suitable for bundling
/// as the template. Refuses to touch an existing file.
pub fn write_template(path: &Path, schema: &Schema) -> Result<(), SchemaError> {
    if path.exists() {
        return Err(SchemaError::TemplateExists(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    schema.apply(&conn)?;
    Ok(())
}
