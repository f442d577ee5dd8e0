//! Process lifecycle: termination signals and the termination hook.
//!
//! The termination hook flushes whatever is still pending. Unlike an
//! ordinary save, a failure here is fatal: there is no later chance to
//! persist, so the host must exit with a non-zero status.

use std::future::Future;

use crate::error::SessionError;
use crate::storage::session::{Persist, SaveOutcome};

/// Process exit status after a clean shutdown.
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit status when the final flush failed.
pub const EXIT_FAILURE: u8 = 1;

/// Outcome of the termination hook.
#[derive(Debug)]
#[must_use]
pub enum FinalFlush {
    /// Nothing was pending.
    Clean,
    /// Pending changes were written.
    Flushed { changes: usize },
    /// The final flush failed; changes are lost.
    Failed(SessionError),
}

impl FinalFlush {
    pub fn is_failure(&self) -> bool {
        matches!(self, FinalFlush::Failed(_))
    }

    /// Status the process should exit with.
    pub fn exit_status(&self) -> u8 {
        if self.is_failure() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Flush pending changes on the way out.
pub async fn run_termination_hook<P: Persist + ?Sized>(target: &P) -> FinalFlush {
    let pending = match target.has_changes().await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!(error = %e, "Could not check for unsaved changes at shutdown");
            return FinalFlush::Failed(e);
        }
    };
    if !pending {
        tracing::debug!("No unsaved changes at shutdown");
        return FinalFlush::Clean;
    }

    match target.save().await {
        Ok(SaveOutcome::Saved { changes }) => {
            tracing::info!(changes, "Flushed unsaved changes at shutdown");
            FinalFlush::Flushed { changes }
        }
        Ok(SaveOutcome::Clean) => FinalFlush::Clean,
        Err(e) => {
            tracing::error!(error = %e, "Could not save store changes at shutdown");
            FinalFlush::Failed(e)
        }
    }
}

/// Drive `work` until it completes or `shutdown` resolves first.
///
/// Returns `None` when interrupted. Whatever `work` changed before that is
/// still pending, so the caller runs the termination hook either way.
pub async fn until_shutdown<W, S>(work: W, shutdown: S) -> Option<W::Output>
where
    W: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        output = work => Some(output),
        () = shutdown => {
            tracing::info!("Interrupted, running termination hook");
            None
        }
    }
}

/// Installed handlers for SIGINT (Ctrl+C) and, on Unix, SIGTERM.
///
/// Install before announcing readiness so no signal is missed.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be installed.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait until a termination signal arrives.
    pub async fn recv(mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigint.recv() => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
                _ = self.sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        Ok(())
    }
}
