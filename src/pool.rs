//! Bounded pool of SQLite connections.
//!
//! Fixed size, blocking acquire with a timeout, and transactional execute
//! helpers that commit on success and roll back on failure. A connection
//! that errored mid-query is discarded and lazily re-opened on a later
//! acquire so a corrupted session never circulates.

use crate::error::AgentError;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

pub struct ConnectionPool {
    db_path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// Opens `size` connections eagerly. Fails fast if the database cannot
    /// be opened at all.
    pub fn open(
        path: impl AsRef<Path>,
        size: usize,
        acquire_timeout: Duration,
    ) -> Result<Arc<Self>, AgentError> {
        let path = path.as_ref();
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(Self::open_connection(path)?);
        }
        info!(
            "Connection pool initialized: {} connections to {}",
            size,
            path.display()
        );
        Ok(Arc::new(Self {
            db_path: path.to_path_buf(),
            idle: Mutex::new(idle),
            permits: Arc::new(Semaphore::new(size)),
            size,
            acquire_timeout,
        }))
    }

    fn open_connection(path: &Path) -> Result<Connection, AgentError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Borrows a connection, waiting up to the configured acquire timeout.
    ///
    /// The semaphore bounds concurrent borrows at `size` regardless of how
    /// many connections were discarded; a missing idle connection is
    /// re-opened here under an already-held permit.
    pub async fn acquire(self: &Arc<Self>) -> Result<PoolHandle, AgentError> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(permit) => permit.expect("pool semaphore is never closed"),
            Err(_) => {
                return Err(AgentError::PoolExhausted {
                    waited: self.acquire_timeout,
                })
            }
        };

        let idle = self.idle.lock().unwrap().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                debug!("re-opening pooled connection to replace a discarded one");
                Self::open_connection(&self.db_path)?
            }
        };

        Ok(PoolHandle {
            conn: Some(conn),
            pool: Arc::clone(self),
            discarded: false,
            _permit: permit,
        })
    }

    /// Runs a write statement in its own transaction: acquire, execute,
    /// commit on success, roll back and discard the connection on failure.
    pub async fn execute(
        self: &Arc<Self>,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<usize, AgentError> {
        let mut handle = self.acquire().await?;
        let result = (|| {
            let tx = handle.transaction()?;
            let rows = tx.execute(sql, params)?;
            tx.commit()?;
            Ok::<usize, rusqlite::Error>(rows)
        })();
        match result {
            Ok(rows) => Ok(rows),
            Err(e) => {
                handle.discard();
                Err(AgentError::QueryFailed(e))
            }
        }
    }

    /// Runs a read query in its own transaction and maps every row.
    pub async fn query_rows<T>(
        self: &Arc<Self>,
        sql: &str,
        params: impl rusqlite::Params,
        mut map_row: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, AgentError> {
        let mut handle = self.acquire().await?;
        let result = (|| {
            let tx = handle.transaction()?;
            let rows = {
                let mut stmt = tx.prepare_cached(sql)?;
                let mapped = stmt.query_map(params, |row| map_row(row))?;
                mapped.collect::<rusqlite::Result<Vec<T>>>()?
            };
            tx.commit()?;
            Ok::<Vec<T>, rusqlite::Error>(rows)
        })();
        match result {
            Ok(rows) => Ok(rows),
            Err(e) => {
                handle.discard();
                Err(AgentError::QueryFailed(e))
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently free to borrow.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Connections currently borrowed.
    pub fn in_use(&self) -> usize {
        self.size - self.available()
    }
}

/// One borrowed connection. Returned to the pool on drop unless discarded.
pub struct PoolHandle {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
    discarded: bool,
    _permit: OwnedSemaphorePermit,
}

impl PoolHandle {
    /// Marks the connection as unusable; it is dropped instead of returned
    /// and a replacement is opened on a later acquire.
    pub fn discard(&mut self) {
        self.discarded = true;
    }
}

impl Deref for PoolHandle {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PoolHandle {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.discarded {
                debug!("discarding pooled connection after error");
            } else {
                self.pool.idle.lock().unwrap().push(conn);
            }
        }
        // The permit drops with the handle, waking one blocked acquirer.
    }
}
