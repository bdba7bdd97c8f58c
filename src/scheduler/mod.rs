//! Reminder scheduling: the live timer facility and store reconciliation.

pub mod jobs;
pub mod reconcile;

pub use jobs::{JobExecutor, JobQueue, ReminderPayload};
pub use reconcile::{
    QuestionDelivery, cancel_single, handle_reminder_fire, reconcile_all, reminder_job_name,
    set_single,
};
