//! Configuration parsing for the comics store.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Platform defaults for the data directory

use clap::Args;
use std::path::PathBuf;

use crate::observability::tracing::LogFormat;
use crate::store::StoreOptions;

/// Options shared by every `comics` subcommand.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Directory holding comics.sqlite (defaults to the user's documents directory)
    #[arg(short, long, global = true, env = "COMICS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the bundled comics.sqlite template
    #[arg(short, long, global = true, env = "COMICS_BUNDLE_DIR", default_value = "./resources")]
    pub bundle_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log line format
    #[arg(long, global = true, env = "COMICS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Size of the session command channel (backpressure control)
    #[arg(long, global = true, env = "COMICS_CHANNEL_SIZE", default_value_t = 64)]
    pub channel_size: usize,

    /// SQLite busy timeout in milliseconds
    #[arg(long, global = true, env = "COMICS_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Abort startup if the legacy purge or template seed failed
    #[arg(long, global = true)]
    pub strict: bool,
}

impl Config {
    /// Store options derived from this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            data_dir: self.data_dir.clone(),
            bundle_dir: self.bundle_dir.clone(),
            channel_size: self.channel_size,
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }

    /// Create a configuration rooted in a scratch directory for testing.
    #[cfg(test)]
    pub fn test_config(root: PathBuf) -> Self {
        Self {
            data_dir: Some(root.join("documents")),
            bundle_dir: root.join("bundle"),
            log_level: "debug".into(),
            log_format: LogFormat::Text,
            channel_size: 8,
            busy_timeout_ms: 100,
            strict: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            bundle_dir: PathBuf::from("./resources"),
            log_level: "info".into(),
            log_format: LogFormat::Text,
            channel_size: 64,
            busy_timeout_ms: 5000,
            strict: false,
        }
    }
}
