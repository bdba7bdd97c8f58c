//! Wired core: store, tracker, registry, and live schedule as one unit.
//!
//! [`QuizCore::start`] performs the startup sequence — open the database
//! (fatal if a corrupt file cannot be reclaimed), reconcile the schema,
//! rebuild the reminder schedule from persisted preferences — and hands back
//! a facade the front end calls directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::QuizConfig;
use crate::error::Result;
use crate::reminders::ReminderRegistry;
use crate::scheduler::jobs::{JobExecutor, JobQueue};
use crate::scheduler::reconcile::{
    QuestionDelivery, cancel_single, handle_reminder_fire, reconcile_all, set_single,
};
use crate::store::Store;
use crate::tracker::EngagementTracker;

/// The wired engagement/streak/reminder core.
pub struct QuizCore {
    config: QuizConfig,
    store: Arc<Store>,
    tracker: EngagementTracker,
    registry: ReminderRegistry,
    jobs: JobQueue,
}

impl QuizCore {
    /// Open the store, reconcile schema and schedule, and wire the reminder
    /// fire path to `delivery`.
    ///
    /// A [`crate::QuizError::StoreLocked`] from here means the database file
    /// is corrupt and held open elsewhere; callers must abort startup and
    /// surface the message to the operator rather than continue without
    /// persistence.
    pub fn start(config: QuizConfig, delivery: Arc<dyn QuestionDelivery>) -> Result<Self> {
        let store = Arc::new(Store::open(config.db_path.clone())?);
        store.ensure_schema()?;
        info!(path = %store.path().display(), "database ready");

        let tracker = EngagementTracker::new(Arc::clone(&store));
        let registry = ReminderRegistry::new(Arc::clone(&store));

        let default_tz = config.default_tz();
        let quota = config.daily_quota;
        let fire_tracker = tracker.clone();
        let executor: JobExecutor = Box::new(move |payload| {
            let outcome = handle_reminder_fire(
                &fire_tracker,
                delivery.as_ref(),
                quota,
                default_tz,
                payload,
            );
            if let Err(e) = outcome {
                error!(
                    chat = payload.chat_id,
                    user = payload.user_id,
                    error = %e,
                    "reminder fire failed"
                );
            }
        });

        let jobs = JobQueue::new(executor)
            .with_tick(Duration::from_secs(config.scheduler.tick_secs.max(1)));
        reconcile_all(&jobs, &registry, default_tz)?;

        Ok(Self {
            config,
            store,
            tracker,
            registry,
            jobs,
        })
    }

    /// Start the background timer loop.
    pub fn run(&self) -> tokio::task::JoinHandle<()> {
        self.jobs.run()
    }

    /// Persist a reminder and replace its live timer (plus confirmation
    /// probe) in one step.
    pub fn set_reminder(
        &self,
        chat_id: i64,
        user_id: i64,
        hour: u8,
        minute: u8,
        timezone: &str,
    ) -> Result<()> {
        self.registry
            .set_reminder(chat_id, user_id, hour, minute, timezone)?;
        set_single(
            &self.jobs,
            chat_id,
            user_id,
            hour,
            minute,
            timezone,
            self.config.default_tz(),
            Duration::from_secs(self.config.scheduler.probe_delay_secs),
        );
        Ok(())
    }

    /// Remove the live timer for a reminder. The persisted preference is
    /// kept, so a later full reconciliation restores it. Returns whether a
    /// timer was removed.
    pub fn cancel_reminder(&self, chat_id: i64, user_id: i64) -> bool {
        cancel_single(&self.jobs, chat_id, user_id)
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn tracker(&self) -> &EngagementTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &ReminderRegistry {
        &self.registry
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
