//! Shared plumbing for the embedded-SQL caches (§4.3): opening a database
//! file (or an in-memory shared-cache database for tests), and mediating
//! blocking `rusqlite` calls from async callers via `spawn_blocking`, the
//! way `tinymist-package`'s `PackageStorage` mediates blocking filesystem
//! I/O from async call sites.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

/// Where a [`Db`] keeps its data.
#[derive(Debug, Clone)]
pub enum DbLocation {
    /// A file on disk; parent directories are created if missing.
    File(std::path::PathBuf),
    /// An anonymous, in-process database. Uses a shared-cache URI so that
    /// every [`Db`] clone (and every connection opened against the same
    /// name) observes the same data, per §4.3's "In-memory (anonymous) mode
    /// is supported for tests" requirement.
    InMemory {
        /// Unique name disambiguating concurrent in-memory databases
        /// within one process (SQLite shared-cache mode is keyed by URI).
        name: String,
    },
}

impl DbLocation {
    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            DbLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        rusqlite::Error::SqliteFailure(
                            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                            Some(format!("cannot create cache directory: {err}")),
                        )
                    })?;
                }
                Connection::open(path)
            }
            DbLocation::InMemory { name } => {
                let uri = format!("file:{name}?mode=memory&cache=shared");
                Connection::open_with_flags(
                    uri,
                    rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                        | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                        | rusqlite::OpenFlags::SQLITE_OPEN_URI,
                )
            }
        }
    }
}

/// A single shared connection to an embedded SQL database, guarded by a
/// mutex so concurrent async callers serialize on it rather than racing
/// SQLite's own locking. §5 notes writes use short transactions; callers of
/// [`Db::with`] should keep the closure brief for the same reason.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(location: DbLocation) -> rusqlite::Result<Self> {
        let conn = location.open()?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on a blocking-pool thread, so the
    /// calling async task never stalls the event loop on SQLite I/O (§5).
    pub async fn with<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
        .map_err(anyhow::Error::from)
    }

    /// Run `f` against the connection directly on the calling thread,
    /// without going through the async runtime's blocking pool. Only used
    /// for one-time schema setup at [`crate::store::Store`] construction,
    /// which can happen before a Tokio runtime exists.
    pub(crate) fn with_blocking<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> anyhow::Result<T> {
        let guard = self.conn.lock();
        Ok(f(&guard)?)
    }
}

/// Resolve a `cache.<name>.path` / `cache.<name>.in-memory` configuration
/// pair (§6) into a [`DbLocation`].
pub fn location_from_config(path: Option<&Path>, in_memory: bool, db_name: &str) -> DbLocation {
    if in_memory || path.is_none() {
        DbLocation::InMemory {
            name: db_name.to_owned(),
        }
    } else {
        DbLocation::File(path.unwrap().join(format!("{db_name}.sqlite")))
    }
}
