//! Observability infrastructure.
//!
//! Provides structured logging via `tracing`.

pub mod tracing;
