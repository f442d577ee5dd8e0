//! SQLite storage layer for the comics store.
//!
//! Provides:
//! - Documents-directory layout and well-known filenames
//! - Legacy-file purge and template seeding
//! - Schema loading, store attach and template writing
//! - The single session, owned by a dedicated thread
//! - Comic entity SQL

pub mod bootstrap;
pub mod comic;
pub mod layout;
pub mod schema;
pub mod session;
