//! The single read/write session over the store.
//!
//! A dedicated thread owns the SQLite connection. Every read, write and
//! save is a [`Command`] sent over a bounded channel, so all access happens
//! on that one thread without a lock.
//!
//! Mutations open a transaction lazily; the transaction stays open until
//! [`SessionHandle::save`] commits it. Reads on the session see its own
//! uncommitted changes.

use async_trait::async_trait;
use rusqlite::Connection;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};

use super::comic::{self, Comic, MIN_COMIC_NUMBER};
use crate::error::{SessionError, StartupError};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was pending; the file was not written.
    Clean,
    /// Pending changes were committed.
    Saved { changes: usize },
}

/// Anything that holds unsaved changes and can flush them.
#[async_trait]
pub trait Persist: Send + Sync {
    async fn has_changes(&self) -> Result<bool, SessionError>;

    async fn save(&self) -> Result<SaveOutcome, SessionError>;
}

/// Commands processed by the session thread.
enum Command {
    Upsert { comic: Comic, reply: Reply<()> },
    Get { number: i64, reply: Reply<Option<Comic>> },
    LastKnown { reply: Reply<Option<Comic>> },
    All { reply: Reply<Vec<Comic>> },
    WithoutImage { reply: Reply<Vec<Comic>> },
    Count { reply: Reply<i64> },
    SetLoading { number: i64, loading: bool, reply: Reply<bool> },
    DeleteAll { reply: Reply<usize> },
    HasChanges { reply: Reply<bool> },
    Save { reply: Reply<SaveOutcome> },
    Rollback { reply: Reply<usize> },
    Close { reply: oneshot::Sender<()> },
}

/// Session state, owned by the session thread.
struct Session {
    conn: Connection,
    /// Rows changed since the last commit.
    pending: usize,
}

impl Session {
    fn new(conn: Connection) -> Self {
        Self { conn, pending: 0 }
    }

    /// Run a mutation inside the session transaction, opening it if needed.
    fn mutate<F>(&mut self, f: F) -> Result<usize, SessionError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        let changed = f(&self.conn)?;
        self.pending += changed;
        Ok(changed)
    }

    fn has_changes(&self) -> bool {
        self.pending > 0
    }

    fn save(&mut self) -> Result<SaveOutcome, SessionError> {
        if self.conn.is_autocommit() {
            return Ok(SaveOutcome::Clean);
        }

        match self.conn.execute_batch("COMMIT") {
            Ok(()) => {
                let changes = std::mem::take(&mut self.pending);
                if changes == 0 {
                    Ok(SaveOutcome::Clean)
                } else {
                    tracing::debug!(changes, "Session saved");
                    Ok(SaveOutcome::Saved { changes })
                }
            }
            Err(e) => {
                // SQLite keeps the transaction open on some failures (busy,
                // deferred constraints); otherwise the changes are gone.
                if self.conn.is_autocommit() {
                    let lost = std::mem::take(&mut self.pending);
                    tracing::error!(lost, error = %e, "Save failed and changes were rolled back");
                } else {
                    tracing::debug!(pending = self.pending, "Save failed, changes still pending");
                }
                Err(e.into())
            }
        }
    }

    fn rollback(&mut self) -> Result<usize, SessionError> {
        if self.conn.is_autocommit() {
            return Ok(0);
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn upsert(&mut self, comic: &Comic) -> Result<(), SessionError> {
        if comic.number < MIN_COMIC_NUMBER {
            return Err(SessionError::InvalidComic(format!(
                "comic number {} is below {MIN_COMIC_NUMBER}",
                comic.number
            )));
        }
        self.mutate(|conn| comic::upsert(conn, comic))?;
        Ok(())
    }

    /// Process commands until closed or every handle is dropped.
    fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::debug!("Session thread started");

        while let Some(command) = rx.blocking_recv() {
            match command {
                Command::Upsert { comic, reply } => {
                    let _ = reply.send(self.upsert(&comic));
                }
                Command::Get { number, reply } => {
                    let _ = reply.send(comic::get(&self.conn, number).map_err(Into::into));
                }
                Command::LastKnown { reply } => {
                    let _ = reply.send(comic::last_known(&self.conn).map_err(Into::into));
                }
                Command::All { reply } => {
                    let _ = reply.send(comic::all(&self.conn).map_err(Into::into));
                }
                Command::WithoutImage { reply } => {
                    let _ = reply.send(comic::without_image(&self.conn).map_err(Into::into));
                }
                Command::Count { reply } => {
                    let _ = reply.send(comic::count(&self.conn).map_err(Into::into));
                }
                Command::SetLoading {
                    number,
                    loading,
                    reply,
                } => {
                    let result = self
                        .mutate(|conn| comic::set_loading(conn, number, loading))
                        .map(|changed| changed > 0);
                    let _ = reply.send(result);
                }
                Command::DeleteAll { reply } => {
                    let _ = reply.send(self.mutate(comic::delete_all));
                }
                Command::HasChanges { reply } => {
                    let _ = reply.send(Ok(self.has_changes()));
                }
                Command::Save { reply } => {
                    let _ = reply.send(self.save());
                }
                Command::Rollback { reply } => {
                    let _ = reply.send(self.rollback());
                }
                Command::Close { reply } => {
                    self.close();
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle dropped without an explicit close.
        self.close();
    }

    fn close(self) {
        if self.has_changes() {
            tracing::warn!(
                pending = self.pending,
                "Session closed with unsaved changes, discarding them"
            );
        }
        if let Err((_, e)) = self.conn.close() {
            tracing::warn!(error = %e, "Error closing store connection");
        }
        tracing::debug!("Session thread stopped");
    }
}

/// The session thread, owned by whoever opened the store.
pub struct SessionThread {
    handle: SessionHandle,
    join: JoinHandle<()>,
}

impl SessionThread {
    /// Move `conn` onto a new session thread.
    ///
    /// # Arguments
    ///
    /// * `conn` - Attached store connection
    /// * `channel_size` - Capacity of the command channel
    pub fn spawn(conn: Connection, channel_size: usize) -> Result<Self, StartupError> {
        let (tx, rx) = mpsc::channel(channel_size.max(1));
        let session = Session::new(conn);

        let join = thread::Builder::new()
            .name("comics-session".into())
            .spawn(move || session.run(rx))
            .map_err(StartupError::SpawnSession)?;

        Ok(Self {
            handle: SessionHandle { tx },
            join,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Close the session and wait for its thread to exit.
    ///
    /// Pending changes that were not saved are discarded.
    pub async fn close(self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        if self.handle.tx.send(Command::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
        drop(self.handle);
        self.join.join().map_err(|_| SessionError::ThreadPanic)
    }
}

/// Cheap, clonable handle to the session thread.
///
/// Every clone addresses the same single session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Upsert { .. } => "Upsert",
            Command::Get { .. } => "Get",
            Command::LastKnown { .. } => "LastKnown",
            Command::All { .. } => "All",
            Command::WithoutImage { .. } => "WithoutImage",
            Command::Count { .. } => "Count",
            Command::SetLoading { .. } => "SetLoading",
            Command::DeleteAll { .. } => "DeleteAll",
            Command::HasChanges { .. } => "HasChanges",
            Command::Save { .. } => "Save",
            Command::Rollback { .. } => "Rollback",
            Command::Close { .. } => "Close",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Insert or replace a comic. The change is pending until saved.
    pub async fn upsert(&self, comic: Comic) -> Result<(), SessionError> {
        self.request(|reply| Command::Upsert { comic, reply }).await
    }

    pub async fn comic(&self, number: i64) -> Result<Option<Comic>, SessionError> {
        self.request(|reply| Command::Get { number, reply }).await
    }

    /// Highest numbered comic that has been stored.
    pub async fn last_known_comic(&self) -> Result<Option<Comic>, SessionError> {
        self.request(|reply| Command::LastKnown { reply }).await
    }

    /// Every comic, ascending by number.
    pub async fn all_comics(&self) -> Result<Vec<Comic>, SessionError> {
        self.request(|reply| Command::All { reply }).await
    }

    pub async fn comics_without_images(&self) -> Result<Vec<Comic>, SessionError> {
        self.request(|reply| Command::WithoutImage { reply }).await
    }

    pub async fn count(&self) -> Result<i64, SessionError> {
        self.request(|reply| Command::Count { reply }).await
    }

    /// Set the loading marker. Returns `true` if the comic changed.
    pub async fn set_loading(&self, number: i64, loading: bool) -> Result<bool, SessionError> {
        self.request(|reply| Command::SetLoading {
            number,
            loading,
            reply,
        })
        .await
    }

    /// Delete every comic. Returns the number deleted.
    pub async fn delete_all_comics(&self) -> Result<usize, SessionError> {
        self.request(|reply| Command::DeleteAll { reply }).await
    }

    /// Discard pending changes. Returns the number of rows discarded.
    pub async fn rollback(&self) -> Result<usize, SessionError> {
        self.request(|reply| Command::Rollback { reply }).await
    }
}

#[async_trait]
impl Persist for SessionHandle {
    async fn has_changes(&self) -> Result<bool, SessionError> {
        self.request(|reply| Command::HasChanges { reply }).await
    }

    /// Commit pending changes. With nothing pending this writes nothing.
    async fn save(&self) -> Result<SaveOutcome, SessionError> {
        self.request(|reply| Command::Save { reply }).await
    }
}
