//! Error types for the quizstreak core.

use std::path::PathBuf;

/// Top-level error type for the engagement/streak/reminder core.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// The database file is corrupt and could not be rotated aside or removed
    /// because another process holds it open. Fatal at startup: the operator
    /// must close whatever has the file open and restart.
    #[error(
        "database file {path} is locked by another process; \
         close any application using it (editor, DB browser) and restart",
        path = .path.display()
    )]
    StoreLocked {
        /// Path of the database file that could not be reclaimed.
        path: PathBuf,
    },

    /// SQLite error — constraint violations, disk full, and everything else
    /// the store surfaces. Never swallowed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error during database open or corruption recovery.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed calendar-date text (expected `YYYY-MM-DD`).
    #[error("invalid calendar date: {0:?}")]
    Date(String),

    /// Configuration load/parse error.
    #[error("config error: {0}")]
    Config(String),

    /// Connection mutex poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Lock(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QuizError>;
