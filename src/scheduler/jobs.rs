//! In-process recurring-timer facility.
//!
//! Named jobs fire either daily at a wall-clock time in a specific timezone,
//! or once after a delay. Names are unique identifiers: scheduling under an
//! existing name replaces the old job, which is what makes reconciliation
//! idempotent. A tokio background loop ticks, fires due jobs through an
//! executor callback, and recomputes the next run of recurring jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc, offset::LocalResult};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tracing::{debug, error, info};

/// Payload carried by a scheduled reminder job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPayload {
    pub chat_id: i64,
    pub user_id: i64,
    /// Zone name as persisted; resolved (with default fallback) at fire time.
    pub timezone: String,
}

/// Callback executed for each fired job.
pub type JobExecutor = Box<dyn Fn(&ReminderPayload) + Send + Sync>;

/// When a job runs.
#[derive(Debug, Clone)]
enum Schedule {
    /// Every day at `hour:minute` local time in `tz`.
    Daily { hour: u8, minute: u8, tz: Tz },
    /// One-shot.
    Once,
}

#[derive(Debug, Clone)]
struct Job {
    name: String,
    schedule: Schedule,
    payload: ReminderPayload,
    next_run: DateTime<Utc>,
}

/// Live job set plus the background loop driving it.
///
/// Cheap to clone; clones share the same job set.
#[derive(Clone)]
pub struct JobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
    executor: Arc<JobExecutor>,
    tick: Duration,
}

impl JobQueue {
    pub fn new(executor: JobExecutor) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            executor: Arc::new(executor),
            tick: Duration::from_secs(1),
        }
    }

    /// Override the loop tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Install a recurring job firing daily at `hour:minute` in `tz`,
    /// replacing any job with the same name.
    pub fn schedule_daily(
        &self,
        hour: u8,
        minute: u8,
        tz: Tz,
        name: &str,
        payload: ReminderPayload,
    ) {
        let next_run = next_daily_fire(hour, minute, tz, Utc::now());
        let mut jobs = self.jobs.lock();
        jobs.retain(|j| j.name != name);
        jobs.push(Job {
            name: name.to_owned(),
            schedule: Schedule::Daily { hour, minute, tz },
            payload,
            next_run,
        });
        debug!(job = name, next_run = %next_run, "scheduled daily job");
    }

    /// Install a one-shot job firing after `delay`, replacing any job with
    /// the same name.
    pub fn schedule_once(&self, delay: Duration, name: &str, payload: ReminderPayload) {
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let next_run = Utc::now() + delay;
        let mut jobs = self.jobs.lock();
        jobs.retain(|j| j.name != name);
        jobs.push(Job {
            name: name.to_owned(),
            schedule: Schedule::Once,
            payload,
            next_run,
        });
        debug!(job = name, next_run = %next_run, "scheduled one-shot job");
    }

    /// Cancel the named job. Returns whether anything was removed.
    pub fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|j| j.name != name);
        jobs.len() < before
    }

    /// Names of all currently-scheduled jobs.
    pub fn list_active(&self) -> Vec<String> {
        self.jobs.lock().iter().map(|j| j.name.clone()).collect()
    }

    /// Next fire time of the named job, if scheduled.
    pub fn next_run_of(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs
            .lock()
            .iter()
            .find(|j| j.name == name)
            .map(|j| j.next_run)
    }

    /// Start the background loop. Jobs scheduled or cancelled afterwards are
    /// picked up on the next tick; the handle can be aborted to stop.
    pub fn run(&self) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            info!(tick_secs = queue.tick.as_secs_f64(), "job queue started");
            let mut interval = tokio::time::interval(queue.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                queue.fire_due(Utc::now());
            }
        })
    }

    /// Fire every job due at `now`; returns how many fired.
    ///
    /// The executor runs outside the job-set lock, so a callback may itself
    /// schedule or cancel jobs.
    pub(crate) fn fire_due(&self, now: DateTime<Utc>) -> usize {
        let mut due: Vec<(String, ReminderPayload)> = Vec::new();
        {
            let mut jobs = self.jobs.lock();
            let mut i = 0;
            while i < jobs.len() {
                if jobs[i].next_run > now {
                    i += 1;
                    continue;
                }
                due.push((jobs[i].name.clone(), jobs[i].payload.clone()));
                match jobs[i].schedule {
                    Schedule::Daily { hour, minute, tz } => {
                        jobs[i].next_run = next_daily_fire(hour, minute, tz, now);
                        i += 1;
                    }
                    Schedule::Once => {
                        jobs.remove(i);
                    }
                }
            }
        }

        for (name, payload) in &due {
            debug!(job = name.as_str(), chat = payload.chat_id, user = payload.user_id, "job fired");
            (self.executor)(payload);
        }
        due.len()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("jobs", &self.list_active())
            .field("tick", &self.tick)
            .finish()
    }
}

/// First instant strictly after `after` at which `hour:minute` local time in
/// `tz` occurs.
///
/// DST-ambiguous local times resolve to the earliest instant; a local time
/// that does not exist on some day (spring-forward gap) is skipped to the
/// next day.
pub(crate) fn next_daily_fire(
    hour: u8,
    minute: u8,
    tz: Tz,
    after: DateTime<Utc>,
) -> DateTime<Utc> {
    let mut day = after.with_timezone(&tz).date_naive();
    // At most two iterations in practice; the bound guards calendar overflow.
    for _ in 0..4 {
        if let Some(local) = day.and_hms_opt(u32::from(hour), u32::from(minute), 0) {
            let instant = match local.and_local_timezone(tz) {
                LocalResult::Single(dt) => Some(dt),
                LocalResult::Ambiguous(earliest, _) => Some(earliest),
                LocalResult::None => None,
            };
            if let Some(dt) = instant {
                let utc = dt.with_timezone(&Utc);
                if utc > after {
                    return utc;
                }
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    // Unreachable for valid hour/minute; degrade to a day from now.
    error!(hour, minute, "could not compute next daily fire time");
    after + chrono::Duration::days(1)
}

/// Helper for callers that report "next reminder at ...": the computed next
/// fire time rendered in the job's own zone.
pub fn next_fire_local(hour: u8, minute: u8, tz: Tz) -> DateTime<Tz> {
    next_daily_fire(hour, minute, tz, Utc::now()).with_timezone(&tz)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
