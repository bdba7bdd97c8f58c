//! Reconciliation between persisted reminder preferences and live timers.
//!
//! The live schedule is always re-derivable from the store: on startup (and
//! on every reminder change) stale timers are cancelled before consistent
//! ones are installed, so a crash between the two at worst leaves a user
//! unscheduled until the next restart re-runs reconciliation.

use std::time::Duration;

use chrono_tz::Tz;
use tracing::{debug, info};

use crate::error::Result;
use crate::reminders::ReminderRegistry;
use crate::scheduler::jobs::{JobQueue, ReminderPayload};
use crate::tracker::EngagementTracker;
use crate::tz::{resolve_zone, today_in_zone};

/// Name prefix identifying daily reminder jobs in the queue.
pub const REMINDER_JOB_PREFIX: &str = "daily-";

/// Deterministic job name for a (chat, user) reminder.
pub fn reminder_job_name(chat_id: i64, user_id: i64) -> String {
    format!("daily-{chat_id}-{user_id}")
}

/// Name of the one-shot confirmation probe for a (chat, user) reminder.
pub fn probe_job_name(chat_id: i64, user_id: i64) -> String {
    format!("test-{}", reminder_job_name(chat_id, user_id))
}

/// Question-delivery collaborator, invoked when a reminder fires for a user
/// who has not yet met today's quota.
pub trait QuestionDelivery: Send + Sync {
    fn send_question(&self, chat_id: i64, user_id: i64);
}

/// Rebuild the live schedule from persisted preferences.
///
/// Cancels every scheduled daily-reminder job, then installs one recurring
/// job per stored preference. Idempotent: running it twice leaves exactly
/// one job per preference. Returns how many jobs were installed.
pub fn reconcile_all(
    jobs: &JobQueue,
    registry: &ReminderRegistry,
    default_tz: Tz,
) -> Result<usize> {
    for name in jobs.list_active() {
        if name.starts_with(REMINDER_JOB_PREFIX) {
            jobs.cancel(&name);
        }
    }

    let mut installed = 0;
    for pref in registry.list_all_reminders()? {
        let tz = resolve_zone(&pref.timezone, default_tz);
        jobs.schedule_daily(
            pref.hour,
            pref.minute,
            tz,
            &reminder_job_name(pref.chat_id, pref.user_id),
            ReminderPayload {
                chat_id: pref.chat_id,
                user_id: pref.user_id,
                timezone: pref.timezone,
            },
        );
        installed += 1;
    }

    info!(count = installed, "rebuilt daily reminder schedule from store");
    Ok(installed)
}

/// Install (or replace) the live timer for one reminder, plus a one-shot
/// confirmation probe that exercises the same fire path after `probe_delay`.
pub fn set_single(
    jobs: &JobQueue,
    chat_id: i64,
    user_id: i64,
    hour: u8,
    minute: u8,
    timezone: &str,
    default_tz: Tz,
    probe_delay: Duration,
) {
    let name = reminder_job_name(chat_id, user_id);
    jobs.cancel(&name);

    let tz = resolve_zone(timezone, default_tz);
    let payload = ReminderPayload {
        chat_id,
        user_id,
        timezone: timezone.to_owned(),
    };
    jobs.schedule_daily(hour, minute, tz, &name, payload.clone());
    jobs.schedule_once(probe_delay, &probe_job_name(chat_id, user_id), payload);
}

/// Cancel the live timer for one reminder. Returns whether a timer was
/// actually removed. The persisted preference is left untouched.
pub fn cancel_single(jobs: &JobQueue, chat_id: i64, user_id: i64) -> bool {
    jobs.cancel(&reminder_job_name(chat_id, user_id))
}

/// Handle a fired reminder: compute "today" in the payload's zone, and
/// deliver a question unless the user already met the quota through earlier
/// interaction. Returns whether a question was delivered.
pub fn handle_reminder_fire(
    tracker: &EngagementTracker,
    delivery: &dyn QuestionDelivery,
    daily_quota: i64,
    default_tz: Tz,
    payload: &ReminderPayload,
) -> Result<bool> {
    let tz = resolve_zone(&payload.timezone, default_tz);
    let today = today_in_zone(tz);

    let answered = tracker.get_daily_count(payload.chat_id, payload.user_id, &today)?;
    if answered >= daily_quota {
        debug!(
            chat = payload.chat_id,
            user = payload.user_id,
            answered,
            "quota already met, skipping reminder delivery"
        );
        return Ok(false);
    }

    delivery.send_question(payload.chat_id, payload.user_id);
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
