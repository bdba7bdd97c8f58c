//! Persisted reminder preferences.
//!
//! One reminder time + timezone per (chat, user). The registry only owns
//! persistence; turning rows into live timers is the reconciler's job.

use std::sync::Arc;

use rusqlite::{OptionalExtension, params};

use crate::error::Result;
use crate::store::Store;

/// A persisted reminder preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPref {
    pub chat_id: i64,
    pub user_id: i64,
    /// Hour of day, 0-23, in the preference's timezone.
    pub hour: u8,
    /// Minute of hour, 0-59.
    pub minute: u8,
    /// IANA zone name as supplied by the caller; not validated here.
    /// Resolution falls back to the configured default zone at
    /// schedule-evaluation time.
    pub timezone: String,
}

/// Reminder preference registry over the shared store.
#[derive(Clone)]
pub struct ReminderRegistry {
    store: Arc<Store>,
}

impl ReminderRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fully replace the reminder for this (chat, user). Callers validate
    /// hour/minute ranges before calling; the registry stores what it is
    /// given.
    pub fn set_reminder(
        &self,
        chat_id: i64,
        user_id: i64,
        hour: u8,
        minute: u8,
        timezone: &str,
    ) -> Result<()> {
        self.store.with_tx(|tx| {
            tx.execute(
                "INSERT INTO user_prefs (chat_id, user_id, notify_hour, notify_minute, tz) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(chat_id, user_id) DO UPDATE SET \
                   notify_hour = excluded.notify_hour, \
                   notify_minute = excluded.notify_minute, \
                   tz = excluded.tz",
                params![chat_id, user_id, i64::from(hour), i64::from(minute), timezone],
            )?;
            Ok(())
        })
    }

    /// The stored reminder, or `None` when no reminder is configured.
    pub fn get_reminder(&self, chat_id: i64, user_id: i64) -> Result<Option<ReminderPref>> {
        let conn = self.store.lock()?;
        let pref = conn
            .query_row(
                "SELECT notify_hour, notify_minute, tz FROM user_prefs \
                 WHERE chat_id = ?1 AND user_id = ?2 \
                   AND notify_hour IS NOT NULL \
                   AND notify_minute IS NOT NULL \
                   AND tz IS NOT NULL",
                params![chat_id, user_id],
                |row| {
                    Ok(ReminderPref {
                        chat_id,
                        user_id,
                        hour: row.get::<_, i64>(0)? as u8,
                        minute: row.get::<_, i64>(1)? as u8,
                        timezone: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(pref)
    }

    /// Every saved reminder, re-queried from current state. Rows with any
    /// missing scheduling column are skipped. Used by the reconciler to
    /// rebuild the live schedule after a restart.
    pub fn list_all_reminders(&self) -> Result<Vec<ReminderPref>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id, user_id, notify_hour, notify_minute, tz \
             FROM user_prefs \
             WHERE notify_hour IS NOT NULL \
               AND notify_minute IS NOT NULL \
               AND tz IS NOT NULL",
        )?;
        let prefs = stmt
            .query_map([], |row| {
                Ok(ReminderPref {
                    chat_id: row.get(0)?,
                    user_id: row.get(1)?,
                    hour: row.get::<_, i64>(2)? as u8,
                    minute: row.get::<_, i64>(3)? as u8,
                    timezone: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<ReminderPref>>>()?;
        Ok(prefs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> (tempfile::TempDir, ReminderRegistry) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = Store::open(dir.path().join("quiz_scores.db")).expect("open");
        store.ensure_schema().expect("schema");
        (dir, ReminderRegistry::new(Arc::new(store)))
    }

    #[test]
    fn get_without_set_is_none() {
        let (_dir, registry) = test_registry();
        assert_eq!(registry.get_reminder(1, 2).expect("get"), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, registry) = test_registry();
        registry
            .set_reminder(1, 2, 7, 30, "Asia/Kolkata")
            .expect("set");

        let pref = registry.get_reminder(1, 2).expect("get").expect("some");
        assert_eq!(pref.hour, 7);
        assert_eq!(pref.minute, 30);
        assert_eq!(pref.timezone, "Asia/Kolkata");
    }

    #[test]
    fn set_replaces_rather_than_merges() {
        let (_dir, registry) = test_registry();
        registry
            .set_reminder(1, 2, 7, 30, "Asia/Kolkata")
            .expect("first");
        registry
            .set_reminder(1, 2, 21, 0, "Europe/Berlin")
            .expect("second");

        let pref = registry.get_reminder(1, 2).expect("get").expect("some");
        assert_eq!((pref.hour, pref.minute), (21, 0));
        assert_eq!(pref.timezone, "Europe/Berlin");

        assert_eq!(registry.list_all_reminders().expect("list").len(), 1);
    }

    #[test]
    fn list_reflects_current_state_not_a_snapshot() {
        let (_dir, registry) = test_registry();
        registry.set_reminder(1, 2, 7, 30, "UTC").expect("set");
        assert_eq!(registry.list_all_reminders().expect("list").len(), 1);

        registry.set_reminder(3, 4, 8, 0, "UTC").expect("set");
        let prefs = registry.list_all_reminders().expect("list");
        assert_eq!(prefs.len(), 2);
        assert!(prefs.iter().any(|p| p.chat_id == 3 && p.user_id == 4));
    }

    #[test]
    fn unvalidated_timezone_is_stored_verbatim() {
        let (_dir, registry) = test_registry();
        registry.set_reminder(1, 2, 9, 15, "Made/Up").expect("set");
        let pref = registry.get_reminder(1, 2).expect("get").expect("some");
        assert_eq!(pref.timezone, "Made/Up");
    }
}
