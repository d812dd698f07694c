// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One locked handle over one trace store file.
//!
//! ```text
//! +-------------+   TraceAction*     +--------+
//! | processors  +----------Q--------> Tracer  |
//! | (many)      |                    | thread |
//! +-------------+                    +---+----+
//!                                        |
//!                                    +---v-----+      +------------+
//!                                    | TraceDb +------> trace file |
//!                                    +---^-----+      +------------+
//!                                        |
//! +-------------+                        |
//! |  analysis   +------------------------+
//! |  readers    |
//! +-------------+
//! ```
//!
//! Every statement on a handle, read or write, runs under the handle's single
//! lock. Reads materialize their full result set under the lock and hand the
//! caller a [`TraceRows`] over rows that are already in memory, so callers
//! can iterate as slowly as they like without blocking writers.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, Params, Row};

use crate::errors::TraceError;
use crate::trace::entities::ComponentState;
use crate::trace::schema::{CREATE_STATEMENTS, TRACE_SCHEMA_VERSION};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a handle may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    /// Post-hoc or live analysis. Every write is rejected.
    ReadOnly,
    /// The handle an active run records through.
    ReadWrite,
}

#[derive(Debug)]
pub struct TraceDb {
    conn: Mutex<Connection>,
    mode: TraceMode,
    path: PathBuf,
}

impl TraceDb {
    /// Create and bootstrap a new trace store, returning a read-write handle.
    ///
    /// Fails if anything already exists at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(TraceError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let tx = conn.transaction()?;
        for sql in CREATE_STATEMENTS {
            tx.execute_batch(sql)?;
        }
        tx.execute(
            "INSERT INTO etl (state_code, db_ver) VALUES (?1, ?2)",
            params![ComponentState::Init, TRACE_SCHEMA_VERSION],
        )?;
        tx.commit()?;

        Ok(Self {
            conn: Mutex::new(conn),
            mode: TraceMode::ReadWrite,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing trace store. Fails if `path` does not exist.
    pub fn open(path: impl AsRef<Path>, mode: TraceMode) -> Result<Self, TraceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TraceError::Missing {
                path: path.to_path_buf(),
            });
        }

        let flags = match mode {
            TraceMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            TraceMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        };
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
            mode,
            path: path.to_path_buf(),
        })
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        Self::open(path, TraceMode::ReadOnly)
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.mode == TraceMode::ReadOnly
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute one write.
    ///
    /// With `commit` false the write joins an open transaction (starting one
    /// if needed) and becomes visible to other handles at the next commit.
    /// With `commit` true the write and everything deferred before it are
    /// committed before the lock is released.
    pub fn execute_update<P: Params>(&self, sql: &str, params: P, commit: bool) -> Result<usize, TraceError> {
        self.assert_readwrite()?;
        let conn = self.lock()?;

        if !commit && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        let changed = conn.execute(sql, params)?;
        if commit && !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(changed)
    }

    /// Commit any deferred writes.
    pub fn commit(&self) -> Result<(), TraceError> {
        self.assert_readwrite()?;
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    /// True while deferred writes are waiting for a commit.
    pub fn has_pending_writes(&self) -> Result<bool, TraceError> {
        Ok(!self.lock()?.is_autocommit())
    }

    /// Run a query and materialize every row before releasing the lock.
    pub fn execute_select<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<TraceRows<T>, TraceError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(sql)?;
            let mapped = stmt.query_map(params, map)?;
            mapped.collect::<Result<Vec<T>, _>>()?
        };
        Ok(TraceRows {
            rows: rows.into_iter(),
        })
    }

    /// First row of a query; an empty result is an error.
    pub fn execute_select_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<T, TraceError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.execute_select(sql, params, map)?
            .next()
            .ok_or_else(|| TraceError::NoRows {
                sql: sql.trim().to_string(),
            })
    }

    /// Value of a single-column count query.
    pub fn execute_count<P: Params>(&self, sql: &str, params: P) -> Result<u64, TraceError> {
        let count: i64 = self.execute_select_one(sql, params, |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Global run state from the `etl` table.
    pub fn etl_state(&self) -> Result<ComponentState, TraceError> {
        self.execute_select_one("SELECT state_code FROM etl", [], |row| row.get(0))
    }

    pub fn schema_version(&self) -> Result<String, TraceError> {
        self.execute_select_one("SELECT db_ver FROM etl", [], |row| row.get(0))
    }

    /// Set the global run state. Always committed immediately.
    pub fn set_etl_state(&self, state: ComponentState) -> Result<(), TraceError> {
        self.execute_update("UPDATE etl SET state_code = ?1", params![state], true)?;
        Ok(())
    }

    fn assert_readwrite(&self) -> Result<(), TraceError> {
        if self.is_readonly() {
            return Err(TraceError::ReadOnly {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TraceError> {
        self.conn.lock().map_err(|_| TraceError::LockPoisoned)
    }
}

/// Rows already read from the store, handed out one at a time.
#[derive(Debug)]
pub struct TraceRows<T> {
    rows: std::vec::IntoIter<T>,
}

impl<T> Iterator for TraceRows<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T> ExactSizeIterator for TraceRows<T> {}
