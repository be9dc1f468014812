//! [`SqliteStore`] -- the SQLite-backed engine behind every service.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use kaban_core::CancelToken;

use crate::error::{Result, StorageError};
use crate::sqlite::schema;

/// Maximum attempts for busy/locked statements.
const RETRY_ATTEMPTS: u32 = 3;

/// Base backoff before the second attempt; doubles per attempt.
const RETRY_BASE: Duration = Duration::from_millis(25);

/// SQLite-backed implementation of the [`Storage`](crate::traits::Storage)
/// trait.
///
/// Wraps a [`rusqlite::Connection`] in a `Mutex`. All public methods acquire
/// the lock, execute SQL, and release it; cross-process writers serialise on
/// SQLite's write lock (WAL mode keeps readers non-blocking).
pub struct SqliteStore {
    /// The mutex-protected SQLite connection.
    pub(crate) conn: Mutex<Connection>,
    /// Optional cooperative cancellation signal.
    cancel: Option<CancelToken>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at the given path, creating
    /// parent directories as needed.
    ///
    /// Enables WAL mode and foreign keys, then applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(?path, "opening SQLite database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StorageError::Connection(format!("failed to open {}: {e}", path.display()))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            cancel: None,
        };
        store.configure_connection()?;
        store.apply_migrations()?;

        Ok(store)
    }

    /// Opens an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory SQLite database");
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("failed to open in-memory db: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            cancel: None,
        };
        store.configure_connection()?;
        store.apply_migrations()?;

        Ok(store)
    }

    /// Attaches a cancellation token. The store checks it at operation entry
    /// and between the statements of multi-step operations.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Surfaces [`StorageError::Cancelled`] if cancellation was requested.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(StorageError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Sets connection pragmas (WAL mode, foreign keys, busy timeout).
    fn configure_connection(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::Connection(format!("failed to set pragmas: {e}")))?;
        Ok(())
    }

    /// Applies unapplied migrations in order, recording each in
    /// `__migrations` inside the same transaction that applies it.
    fn apply_migrations(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS __migrations (
                name       TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .map_err(|e| StorageError::Migration {
            name: "__migrations".into(),
            reason: e.to_string(),
        })?;

        for &(name, sql) in schema::MIGRATIONS {
            let already_applied: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM __migrations WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get::<_, i32>(0),
                )
                .unwrap_or(0)
                > 0;

            if already_applied {
                debug!(name, "migration already applied, skipping");
                continue;
            }

            debug!(name, "applying migration");
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| StorageError::Migration {
                    name: name.to_string(),
                    reason: format!("failed to begin: {e}"),
                })?;

            for stmt in schema::split_statements(sql) {
                tx.execute_batch(stmt).map_err(|e| StorageError::Migration {
                    name: name.to_string(),
                    reason: format!("{e}\nStatement: {}", truncate(stmt, 120)),
                })?;
            }

            tx.execute(
                "INSERT INTO __migrations (name) VALUES (?1)",
                rusqlite::params![name],
            )
            .map_err(|e| StorageError::Migration {
                name: name.to_string(),
                reason: format!("failed to record migration: {e}"),
            })?;

            tx.commit().map_err(|e| StorageError::Migration {
                name: name.to_string(),
                reason: format!("failed to commit: {e}"),
            })?;
        }

        info!("schema up to date ({} migrations)", schema::MIGRATIONS.len());
        Ok(())
    }

    /// Acquires the connection lock. Helper used by all operation modules.
    pub(crate) fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("mutex poisoned: {e}")))
    }

    /// Runs an operation with bounded retry on busy/locked/constraint races.
    ///
    /// The closure must be a complete, self-contained operation: on retry it
    /// re-runs from scratch against a fresh view of the database (this is
    /// how short-id allocation conflicts between processes resolve).
    pub(crate) fn with_retry<T>(
        &self,
        mut f: impl FnMut(&Connection) -> Result<T>,
    ) -> Result<T> {
        self.check_cancelled()?;
        for attempt in 1..=RETRY_ATTEMPTS {
            let result = {
                let conn = self.lock_conn()?;
                f(&conn)
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt < RETRY_ATTEMPTS => {
                    let backoff = RETRY_BASE * 2u32.pow(attempt - 1);
                    warn!(attempt, ?backoff, error = %e, "retrying after transient database error");
                    std::thread::sleep(backoff);
                    self.check_cancelled()?;
                }
                Err(e) if is_busy(&e) => {
                    return Err(StorageError::BusyAfterRetry {
                        attempts: RETRY_ATTEMPTS,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::BusyAfterRetry {
            attempts: RETRY_ATTEMPTS,
        })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// Busy/locked states worth backing off for.
fn is_busy(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::Query(rusqlite::Error::SqliteFailure(e, _))
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

/// Transient errors that a re-run may resolve: busy/locked, plus unique-index
/// races on short-id allocation between concurrent writers.
fn is_retryable(err: &StorageError) -> bool {
    if is_busy(err) {
        return true;
    }
    matches!(
        err,
        StorageError::Query(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Truncates a string for error messages.
fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("{}...", &s[..max])
    } else {
        s.to_string()
    }
}
