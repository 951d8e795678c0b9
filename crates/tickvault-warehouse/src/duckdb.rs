//! `DuckDB` connection pool shared by writers and readers.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

/// Access mode requested for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    ReadOnly,
    /// Read-write access.
    ReadWrite,
}

#[derive(Default)]
struct PoolState {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl PoolState {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    state: Mutex<PoolState>,
}

/// Caches idle connections per access mode and hands them out on demand.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Create a pool for the database file at `path`.
    ///
    /// `max_pool_size` bounds how many idle connections are retained per
    /// access mode; it is clamped to at least 1.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_pool_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_pool_size: max_pool_size.max(1),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Take a pooled connection, opening a fresh one when the pool is dry.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or
    /// configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned (a previous panic while
    /// holding the lock).
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let pooled = self
            .inner
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .slot(mode)
            .pop();

        let connection = match pooled {
            Some(connection) => connection,
            None => open_connection(self.inner.db_path.as_path(), mode)?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// Connection handle that returns to its pool on drop.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut state = self
            .pool
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let slot = state.slot(self.mode);
        if slot.len() < self.pool.max_pool_size {
            slot.push(connection);
        }
    }
}

fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    configure_connection(&connection, mode)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection, mode: AccessMode) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    if mode == AccessMode::ReadOnly {
        // This statement can fail on older embedded versions; the query
        // layer still enforces read-only semantics.
        let _ = connection.execute_batch("SET access_mode = 'READ_ONLY';");
    }
    Ok(())
}
