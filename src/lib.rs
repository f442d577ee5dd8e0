//! Comics store: the on-device SQLite database behind a comic reader.
//!
//! Locates the per-user documents directory, seeds `comics.sqlite` from a
//! bundled template on first launch, purges the legacy `xkcd.sqlite`, and
//! hands back one read/write session that is flushed on demand and once
//! more at shutdown.
//!
//! # Architecture
//!
//! - **Single session**: one dedicated thread owns the SQLite connection
//! - **Typed startup**: unrecoverable failures vs. recoverable warnings
//! - **Durable on exit**: the termination hook hard-fails if the final flush fails
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Startup and session error types
//! - [`lifecycle`]: Termination signal wiring and the termination hook
//! - [`observability`]: Tracing setup
//! - [`storage`]: Layout, bootstrap, schema, session and comic SQL
//! - [`store`]: The Store Handle

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::session::SessionHandle is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes  // r#""# is fine for SQL
)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod storage;
pub mod store;

pub use error::{SessionError, StartupError, StartupWarning};
pub use storage::comic::{Comic, MIN_COMIC_NUMBER};
pub use storage::session::{SaveOutcome, SessionHandle};
pub use store::{Opened, Prepared, StartupReport, Store, StoreOptions};
