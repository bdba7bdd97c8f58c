//! SQLite DDL and schema reconciliation for the quizstreak store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation. Schema reconciliation is
//! deliberately "rebuild over migrate": a table missing a required column is
//! dropped and recreated, discarding its rows. Engagement state is
//! regenerable quiz data, not irreplaceable user content.

use std::collections::HashSet;

use rusqlite::Connection;

/// A logical table: its name, the columns the current code requires, and its
/// canonical creation SQL.
struct TableSpec {
    name: &'static str,
    required_columns: &'static [&'static str],
    create_sql: &'static str,
}

/// Append-only log of answered questions in the original quiz mode.
const RESULTS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS results (
    chat_id     INTEGER NOT NULL,
    user_id     INTEGER NOT NULL,
    ts          TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    correct     INTEGER NOT NULL CHECK (correct IN (0,1))
);
"#;

/// One row per (chat, user, day); `count` is questions answered that day.
/// The store does not enforce the daily quota — callers check before asking
/// another question, so the stored value may transiently exceed it.
const DAILY_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS daily_progress (
    chat_id     INTEGER NOT NULL,
    user_id     INTEGER NOT NULL,
    day         TEXT    NOT NULL,
    count       INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (chat_id, user_id, day)
);
"#;

/// Exactly one row per (chat, user). Invariant: best_streak >= current_streak.
const STREAKS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS streaks (
    chat_id         INTEGER NOT NULL,
    user_id         INTEGER NOT NULL,
    current_streak  INTEGER NOT NULL DEFAULT 0,
    best_streak     INTEGER NOT NULL DEFAULT 0,
    last_day        TEXT,
    PRIMARY KEY (chat_id, user_id)
);
"#;

/// Reminder preference; absence of a row means "no reminder configured".
const PREFS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_prefs (
    chat_id       INTEGER NOT NULL,
    user_id       INTEGER NOT NULL,
    notify_hour   INTEGER,
    notify_minute INTEGER,
    tz            TEXT,
    PRIMARY KEY (chat_id, user_id)
);
"#;

/// Best-effort display-name cache for the leaderboard; last write wins.
const NAMES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_names (
    chat_id       INTEGER NOT NULL,
    user_id       INTEGER NOT NULL,
    display_name  TEXT,
    PRIMARY KEY (chat_id, user_id)
);
"#;

const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "results",
        required_columns: &["chat_id", "user_id", "ts", "correct"],
        create_sql: RESULTS_SQL,
    },
    TableSpec {
        name: "daily_progress",
        required_columns: &["chat_id", "user_id", "day", "count"],
        create_sql: DAILY_SQL,
    },
    TableSpec {
        name: "streaks",
        required_columns: &["chat_id", "user_id", "current_streak", "best_streak", "last_day"],
        create_sql: STREAKS_SQL,
    },
    TableSpec {
        name: "user_prefs",
        required_columns: &["chat_id", "user_id", "notify_hour", "notify_minute", "tz"],
        create_sql: PREFS_SQL,
    },
    TableSpec {
        name: "user_names",
        required_columns: &["chat_id", "user_id", "display_name"],
        create_sql: NAMES_SQL,
    },
];

/// Supporting indexes, created unconditionally (idempotent).
const INDEXES_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_results_user ON results(chat_id, user_id, ts);
CREATE INDEX IF NOT EXISTS idx_daily_user   ON daily_progress(chat_id, user_id, day);
"#;

/// Create every missing table, rebuild any table with a stale shape, then
/// create supporting indexes. Run once at startup, not interleaved with
/// normal operations.
pub(crate) fn create_or_migrate(conn: &Connection) -> rusqlite::Result<()> {
    for spec in TABLES {
        ensure_table(conn, spec)?;
    }
    conn.execute_batch(INDEXES_SQL)
}

fn ensure_table(conn: &Connection, spec: &TableSpec) -> rusqlite::Result<()> {
    if !table_exists(conn, spec.name)? {
        conn.execute_batch(spec.create_sql)?;
        tracing::info!(table = spec.name, "created table");
        return Ok(());
    }

    let have = table_columns(conn, spec.name)?;
    let missing: Vec<&str> = spec
        .required_columns
        .iter()
        .copied()
        .filter(|col| !have.contains(*col))
        .collect();

    if !missing.is_empty() {
        tracing::warn!(
            table = spec.name,
            missing = %missing.join(", "),
            "rebuilding table due to missing columns; existing rows discarded"
        );
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", spec.name))?;
        conn.execute_batch(spec.create_sql)?;
        tracing::info!(table = spec.name, "recreated table");
    }
    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let mut rows = stmt.query(rusqlite::params![table])?;
    Ok(rows.next()?.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    // PRAGMA arguments cannot be bound; `table` only ever comes from TABLES.
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(cols)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
