//! Daily-quota counting and streak derivation.
//!
//! The tracker owns the semantic read-modify-write sequences over the
//! results, daily-progress, streak, and display-name tables. It is purely
//! date-string based: callers supply canonical `YYYY-MM-DD` days, computed
//! for their own timezone — the tracker never asks what "today" is.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use crate::error::{QuizError, Result};
use crate::store::Store;

/// Streak state for one (chat, user) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakSummary {
    /// Consecutive completed days ending at `last_day`.
    pub current_streak: i64,
    /// Best streak ever recorded; never decreases.
    pub best_streak: i64,
    /// Most recent day marked complete, `YYYY-MM-DD`.
    pub last_day: Option<String>,
}

impl StreakSummary {
    fn empty() -> Self {
        Self {
            current_streak: 0,
            best_streak: 0,
            last_day: None,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakRow {
    pub user_id: i64,
    pub current_streak: i64,
    pub best_streak: i64,
    /// Cached display name, or a generated `User <id>` placeholder.
    pub display_name: String,
}

/// Engagement tracker over the shared store.
#[derive(Clone)]
pub struct EngagementTracker {
    store: Arc<Store>,
}

impl EngagementTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append one answered-question event. No effect on quota or streak.
    pub fn record_quiz_result(&self, chat_id: i64, user_id: i64, correct: bool) -> Result<()> {
        self.store.with_tx(|tx| {
            tx.execute(
                "INSERT INTO results (chat_id, user_id, correct) VALUES (?1, ?2, ?3)",
                params![chat_id, user_id, i64::from(correct)],
            )?;
            Ok(())
        })
    }

    /// Aggregate `(correct, total)` over all recorded results; `(0, 0)` when
    /// no events exist.
    pub fn get_score(&self, chat_id: i64, user_id: i64) -> Result<(i64, i64)> {
        let conn = self.store.lock()?;
        let score = conn.query_row(
            "SELECT COALESCE(SUM(correct), 0), COUNT(*) \
             FROM results WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(score)
    }

    /// Questions answered on `day`; `0` when no row exists.
    pub fn get_daily_count(&self, chat_id: i64, user_id: i64, day: &str) -> Result<i64> {
        let conn = self.store.lock()?;
        let count = conn
            .query_row(
                "SELECT count FROM daily_progress \
                 WHERE chat_id = ?1 AND user_id = ?2 AND day = ?3",
                params![chat_id, user_id, day],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Atomically add one to the day's count, creating the row at 1 if
    /// absent, and return the new count.
    ///
    /// A single upsert statement, so two near-simultaneous calls for the same
    /// key both land — no read-then-write window. The daily quota is not
    /// enforced here; callers check [`Self::get_daily_count`] before asking
    /// another question.
    pub fn increment_daily_count(&self, chat_id: i64, user_id: i64, day: &str) -> Result<i64> {
        self.store.with_tx(|tx| {
            tx.execute(
                "INSERT INTO daily_progress (chat_id, user_id, day, count) \
                 VALUES (?1, ?2, ?3, 1) \
                 ON CONFLICT(chat_id, user_id, day) DO UPDATE SET count = count + 1",
                params![chat_id, user_id, day],
            )?;
            let count = tx.query_row(
                "SELECT count FROM daily_progress \
                 WHERE chat_id = ?1 AND user_id = ?2 AND day = ?3",
                params![chat_id, user_id, day],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Mark `day` complete and derive the new streak state.
    ///
    /// Idempotent per day: a repeat call for the already-recorded day returns
    /// the stored state unchanged. Otherwise the streak extends when the
    /// stored last day is exactly the calendar day before `day`, and resets
    /// to 1 on any gap or absent history. `best_streak` only ever grows.
    pub fn mark_day_complete(
        &self,
        chat_id: i64,
        user_id: i64,
        day: &str,
    ) -> Result<StreakSummary> {
        let yesterday = previous_day(day)?;

        self.store.with_tx(|tx| {
            let stored = tx
                .query_row(
                    "SELECT current_streak, best_streak, last_day \
                     FROM streaks WHERE chat_id = ?1 AND user_id = ?2",
                    params![chat_id, user_id],
                    |row| {
                        Ok(StreakSummary {
                            current_streak: row.get(0)?,
                            best_streak: row.get(1)?,
                            last_day: row.get(2)?,
                        })
                    },
                )
                .optional()?
                .unwrap_or_else(StreakSummary::empty);

            if stored.last_day.as_deref() == Some(day) {
                return Ok(stored);
            }

            let current = if stored.last_day.as_deref() == Some(yesterday.as_str()) {
                stored.current_streak + 1
            } else {
                1
            };
            let best = stored.best_streak.max(current);

            tx.execute(
                "INSERT INTO streaks (chat_id, user_id, current_streak, best_streak, last_day) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(chat_id, user_id) DO UPDATE SET \
                   current_streak = excluded.current_streak, \
                   best_streak = excluded.best_streak, \
                   last_day = excluded.last_day",
                params![chat_id, user_id, current, best, day],
            )?;

            Ok(StreakSummary {
                current_streak: current,
                best_streak: best,
                last_day: Some(day.to_owned()),
            })
        })
    }

    /// Current streak state; all-zero/absent when no row exists.
    pub fn get_streak(&self, chat_id: i64, user_id: i64) -> Result<StreakSummary> {
        let conn = self.store.lock()?;
        let summary = conn
            .query_row(
                "SELECT current_streak, best_streak, last_day \
                 FROM streaks WHERE chat_id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                |row| {
                    Ok(StreakSummary {
                        current_streak: row.get(0)?,
                        best_streak: row.get(1)?,
                        last_day: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary.unwrap_or_else(StreakSummary::empty))
    }

    /// Cache a display name for the leaderboard. Empty names are ignored.
    pub fn set_display_name(&self, chat_id: i64, user_id: i64, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        self.store.with_tx(|tx| {
            tx.execute(
                "INSERT INTO user_names (chat_id, user_id, display_name) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(chat_id, user_id) DO UPDATE SET display_name = excluded.display_name",
                params![chat_id, user_id, name],
            )?;
            Ok(())
        })
    }

    /// Top streaks in a chat, ordered by current streak, then best streak,
    /// then user id for a deterministic tie-break. Users without a cached
    /// display name get a `User <id>` placeholder.
    pub fn get_top_streaks(&self, chat_id: i64, limit: i64) -> Result<Vec<StreakRow>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.user_id, s.current_streak, s.best_streak, \
                    COALESCE(n.display_name, printf('User %d', s.user_id)) \
             FROM streaks s \
             LEFT JOIN user_names n \
               ON n.chat_id = ?1 AND n.user_id = s.user_id \
             WHERE s.chat_id = ?1 \
             ORDER BY s.current_streak DESC, s.best_streak DESC, s.user_id ASC \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![chat_id, limit], |row| {
                Ok(StreakRow {
                    user_id: row.get(0)?,
                    current_streak: row.get(1)?,
                    best_streak: row.get(2)?,
                    display_name: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<StreakRow>>>()?;
        Ok(rows)
    }
}

/// `day - 1` in pure calendar arithmetic, formatted `YYYY-MM-DD`.
fn previous_day(day: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| QuizError::Date(day.to_owned()))?;
    let prev = date
        .pred_opt()
        .ok_or_else(|| QuizError::Date(day.to_owned()))?;
    Ok(prev.format("%Y-%m-%d").to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tracker() -> (tempfile::TempDir, EngagementTracker) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = Store::open(dir.path().join("quiz_scores.db")).expect("open");
        store.ensure_schema().expect("schema");
        (dir, EngagementTracker::new(Arc::new(store)))
    }

    const CHAT: i64 = -100_123;
    const USER: i64 = 42;

    #[test]
    fn score_empty_then_aggregates() {
        let (_dir, tracker) = test_tracker();
        assert_eq!(tracker.get_score(CHAT, USER).expect("score"), (0, 0));

        tracker.record_quiz_result(CHAT, USER, true).expect("r1");
        tracker.record_quiz_result(CHAT, USER, false).expect("r2");
        tracker.record_quiz_result(CHAT, USER, true).expect("r3");

        assert_eq!(tracker.get_score(CHAT, USER).expect("score"), (2, 3));
    }

    #[test]
    fn daily_count_absent_is_zero() {
        let (_dir, tracker) = test_tracker();
        let count = tracker
            .get_daily_count(CHAT, USER, "2024-01-01")
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn increment_returns_new_count_each_time() {
        let (_dir, tracker) = test_tracker();
        for expected in 1..=5 {
            let count = tracker
                .increment_daily_count(CHAT, USER, "2024-01-01")
                .expect("increment");
            assert_eq!(count, expected);
        }
        // The store does not cap the count; a sixth increment still lands.
        assert_eq!(
            tracker
                .increment_daily_count(CHAT, USER, "2024-01-01")
                .expect("increment"),
            6
        );
    }

    #[test]
    fn increments_are_isolated_per_day_and_user() {
        let (_dir, tracker) = test_tracker();
        tracker
            .increment_daily_count(CHAT, USER, "2024-01-01")
            .expect("inc");
        assert_eq!(
            tracker
                .increment_daily_count(CHAT, USER, "2024-01-02")
                .expect("inc"),
            1
        );
        assert_eq!(
            tracker
                .increment_daily_count(CHAT, USER + 1, "2024-01-01")
                .expect("inc"),
            1
        );
    }

    #[test]
    fn concurrent_increments_lose_no_updates() {
        let (_dir, tracker) = test_tracker();
        let n = 8;

        let mut handles = Vec::new();
        for _ in 0..n {
            let t = tracker.clone();
            handles.push(std::thread::spawn(move || {
                t.increment_daily_count(CHAT, USER, "2024-01-01")
                    .expect("concurrent increment")
            }));
        }

        let mut returned: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        returned.sort_unstable();

        // Every value 1..=n appears exactly once: no duplicates, no gaps.
        assert_eq!(returned, (1..=n as i64).collect::<Vec<_>>());
        assert_eq!(
            tracker
                .get_daily_count(CHAT, USER, "2024-01-01")
                .expect("final count"),
            n as i64
        );
    }

    #[test]
    fn first_completion_starts_streak_at_one() {
        let (_dir, tracker) = test_tracker();
        let s = tracker
            .mark_day_complete(CHAT, USER, "2024-01-01")
            .expect("mark");
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.best_streak, 1);
        assert_eq!(s.last_day.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn repeat_completion_same_day_is_noop() {
        let (_dir, tracker) = test_tracker();
        let first = tracker
            .mark_day_complete(CHAT, USER, "2024-01-01")
            .expect("first");
        let second = tracker
            .mark_day_complete(CHAT, USER, "2024-01-01")
            .expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let (_dir, tracker) = test_tracker();
        for (i, day) in ["2024-01-01", "2024-01-02", "2024-01-03"].iter().enumerate() {
            let s = tracker.mark_day_complete(CHAT, USER, day).expect("mark");
            assert_eq!(s.current_streak, i as i64 + 1);
            assert_eq!(s.best_streak, i as i64 + 1);
        }
    }

    #[test]
    fn gap_resets_current_but_keeps_best() {
        let (_dir, tracker) = test_tracker();
        tracker.mark_day_complete(CHAT, USER, "2024-01-01").expect("d1");
        tracker.mark_day_complete(CHAT, USER, "2024-01-02").expect("d2");

        // 2024-01-03 skipped.
        let s = tracker
            .mark_day_complete(CHAT, USER, "2024-01-04")
            .expect("d4");
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.best_streak, 2);
        assert_eq!(s.last_day.as_deref(), Some("2024-01-04"));
    }

    #[test]
    fn month_boundary_counts_as_consecutive() {
        let (_dir, tracker) = test_tracker();
        tracker.mark_day_complete(CHAT, USER, "2024-01-31").expect("jan");
        let s = tracker
            .mark_day_complete(CHAT, USER, "2024-02-01")
            .expect("feb");
        assert_eq!(s.current_streak, 2);
    }

    #[test]
    fn leap_day_counts_as_consecutive() {
        let (_dir, tracker) = test_tracker();
        tracker.mark_day_complete(CHAT, USER, "2024-02-28").expect("feb28");
        tracker.mark_day_complete(CHAT, USER, "2024-02-29").expect("feb29");
        let s = tracker
            .mark_day_complete(CHAT, USER, "2024-03-01")
            .expect("mar1");
        assert_eq!(s.current_streak, 3);
    }

    #[test]
    fn best_streak_is_monotone() {
        let (_dir, tracker) = test_tracker();
        let days = [
            "2024-01-01", "2024-01-02", "2024-01-03", // streak 3
            "2024-01-05", // reset
            "2024-01-07", // reset again
        ];
        let mut prev_best = 0;
        for day in days {
            let s = tracker.mark_day_complete(CHAT, USER, day).expect("mark");
            assert!(s.best_streak >= prev_best);
            assert!(s.best_streak >= s.current_streak);
            prev_best = s.best_streak;
        }
        assert_eq!(prev_best, 3);
    }

    #[test]
    fn malformed_day_is_a_date_error() {
        let (_dir, tracker) = test_tracker();
        let err = tracker
            .mark_day_complete(CHAT, USER, "01/02/2024")
            .expect_err("should reject");
        assert!(matches!(err, QuizError::Date(_)));
    }

    #[test]
    fn get_streak_without_history_is_empty() {
        let (_dir, tracker) = test_tracker();
        let s = tracker.get_streak(CHAT, USER).expect("get");
        assert_eq!(s, StreakSummary::empty());
    }

    #[test]
    fn leaderboard_orders_and_falls_back_to_placeholder() {
        let (_dir, tracker) = test_tracker();

        // user 1: streak 2 (named); user 2: streak 1 (unnamed);
        // user 3: streak 1, higher best (unnamed).
        tracker.mark_day_complete(CHAT, 1, "2024-01-01").expect("m");
        tracker.mark_day_complete(CHAT, 1, "2024-01-02").expect("m");
        tracker.mark_day_complete(CHAT, 2, "2024-01-02").expect("m");
        tracker.mark_day_complete(CHAT, 3, "2024-01-01").expect("m");
        tracker.mark_day_complete(CHAT, 3, "2024-01-02").expect("m");
        tracker.mark_day_complete(CHAT, 3, "2024-01-05").expect("m");
        tracker.set_display_name(CHAT, 1, "Grace").expect("name");

        let rows = tracker.get_top_streaks(CHAT, 10).expect("board");
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].user_id, 1);
        assert_eq!(rows[0].display_name, "Grace");
        assert_eq!(rows[0].current_streak, 2);

        // Tie on current: user 3 wins on best_streak.
        assert_eq!(rows[1].user_id, 3);
        assert_eq!(rows[1].best_streak, 2);
        assert_eq!(rows[2].user_id, 2);
        assert_eq!(rows[2].display_name, "User 2");
    }

    #[test]
    fn leaderboard_respects_limit_and_chat_isolation() {
        let (_dir, tracker) = test_tracker();
        for user in 1..=5 {
            tracker.mark_day_complete(CHAT, user, "2024-01-01").expect("m");
        }
        tracker
            .mark_day_complete(CHAT + 1, 99, "2024-01-01")
            .expect("other chat");

        let rows = tracker.get_top_streaks(CHAT, 3).expect("board");
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.user_id != 99));
    }

    #[test]
    fn empty_display_name_is_ignored() {
        let (_dir, tracker) = test_tracker();
        tracker.mark_day_complete(CHAT, USER, "2024-01-01").expect("m");
        tracker.set_display_name(CHAT, USER, "").expect("empty");

        let rows = tracker.get_top_streaks(CHAT, 10).expect("board");
        assert_eq!(rows[0].display_name, format!("User {USER}"));
    }
}
