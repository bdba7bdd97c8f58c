//! Durable, crash-tolerant SQLite persistence.
//!
//! The [`Store`] owns the on-disk database exclusively: connection lifecycle,
//! pragma configuration, a corruption probe on open (with rotate-or-remove
//! recovery), schema reconciliation, transactional execution, and backups.
//! Callers never see a raw connection; the tracker and registry run their
//! read-modify-write sequences through [`Store::with_tx`].

mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction};

use crate::error::{QuizError, Result};
use crate::retry::retry_backoff;

/// Attempts for each corruption-recovery file operation.
const RECOVERY_ATTEMPTS: u32 = 5;

/// Base backoff between recovery attempts (linear: base * attempt).
const RECOVERY_BACKOFF: Duration = Duration::from_millis(400);

/// Prefix for backup filenames written by [`Store::backup_to`].
const BACKUP_PREFIX: &str = "quizstreak-backup-";

/// Per-connection settings: WAL for concurrent reads during writes,
/// foreign-key enforcement, and NORMAL synchronous as the durability/latency
/// trade-off for a small bot.
const PRAGMAS_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
"#;

/// SQLite store for engagement, streak, and reminder state.
///
/// Thread-safe via an internal `Mutex<Connection>`. All writes are
/// serialized; WAL mode keeps readers unblocked on the SQLite side, though we
/// still acquire the mutex for simplicity.
pub struct Store {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path`.
    ///
    /// An existing file is probed with a read-only integrity check first. A
    /// corrupt file is rotated to a `.corrupt` sibling (or removed when
    /// rotation fails), each with bounded retries; if the file stays
    /// inaccessible — another process holds it open — this returns
    /// [`QuizError::StoreLocked`], which callers must treat as fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() && !integrity_ok(&path) {
            rotate_or_remove(&path)?;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(PRAGMAS_SQL)?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reconcile the on-disk schema with the current table definitions.
    ///
    /// Creates missing tables, rebuilds tables with stale shapes (discarding
    /// their rows), and creates indexes. Run once at startup.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::create_or_migrate(&conn)?;
        Ok(())
    }

    /// Run `work` inside a transaction.
    ///
    /// Commits when `work` returns `Ok`; any `Err` (or panic unwind) rolls
    /// the transaction back before propagating. Exactly one of commit or
    /// rollback happens on every exit path.
    pub fn with_tx<T>(&self, work: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Create an atomic backup via `VACUUM INTO`, named
    /// `quizstreak-backup-{YYYYMMDD-HHMMSS}.db` inside `backup_dir`.
    pub fn backup_to(&self, backup_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(backup_dir)?;

        // UTC timestamp avoids DST ambiguity in filenames.
        let now = chrono::Utc::now();
        let filename = format!("{BACKUP_PREFIX}{}.db", now.format("%Y%m%d-%H%M%S"));
        let dest = backup_dir.join(filename);

        // VACUUM INTO does not support parameter binding; escape quotes in
        // the internally-generated path.
        let conn = self.lock()?;
        let escaped = dest.display().to_string().replace('\'', "''");
        conn.execute_batch(&format!("VACUUM INTO '{escaped}'"))?;

        Ok(dest)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| QuizError::Lock(e.to_string()))
    }
}

/// Read-only integrity probe. Returns `false` for a missing, unopenable, or
/// corrupt file — never creates or modifies it.
fn integrity_ok(path: &Path) -> bool {
    let conn = match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => conn,
        Err(_) => return false,
    };
    match conn.query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0)) {
        Ok(verdict) => verdict.eq_ignore_ascii_case("ok"),
        Err(_) => false,
    }
}

/// Rotate a corrupt database file to a `.corrupt` sibling, falling back to
/// removal. Both paths retry with bounded linear backoff (the file may be
/// transiently locked by an editor or DB viewer, especially on Windows).
fn rotate_or_remove(path: &Path) -> Result<()> {
    let corrupt = corrupt_sibling(path);

    let rotated = retry_backoff(RECOVERY_ATTEMPTS, RECOVERY_BACKOFF, || {
        if corrupt.exists() {
            std::fs::remove_file(&corrupt)?;
        }
        match std::fs::rename(path, &corrupt) {
            // Already gone — nothing left to rotate.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    });

    match rotated {
        Ok(()) => {
            tracing::warn!(
                path = %corrupt.display(),
                "corrupt database rotated aside; a fresh database will be created"
            );
            return Ok(());
        }
        Err(e) => {
            tracing::debug!(error = %e, "rotation failed, attempting removal");
        }
    }

    let removed = retry_backoff(RECOVERY_ATTEMPTS, RECOVERY_BACKOFF, || {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    });

    match removed {
        Ok(()) => {
            tracing::warn!(
                path = %path.display(),
                "corrupt database removed; a fresh database will be created"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "database is locked by another process; close the application holding it open"
            );
            Err(QuizError::StoreLocked {
                path: path.to_path_buf(),
            })
        }
    }
}

/// `<path>.corrupt`, appended to the full filename.
fn corrupt_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
