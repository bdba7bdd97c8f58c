//! Quizstreak: daily quiz engagement, streaks, and restart-durable reminders.
//!
//! Tracks per-user progress against a fixed daily question quota, derives
//! consecutive-day streaks from that activity, and keeps a set of recurring
//! reminder timers consistent with persisted preferences across process
//! restarts.
//!
//! # Architecture
//!
//! Four layers, leaf-first:
//! - **[`store`]**: the embedded SQLite database — corruption probe and
//!   recovery on open, rebuild-over-migrate schema reconciliation, and
//!   transactional execution for every mutation
//! - **[`tracker`]**: quota counters and the streak state machine, purely
//!   calendar-date based
//! - **[`reminders`]**: one persisted reminder time + timezone per
//!   (chat, user)
//! - **[`scheduler`]**: the live timer facility and the reconciler that
//!   rebuilds it from the registry
//!
//! [`runtime::QuizCore`] wires the layers together for a front end; the chat
//! surface itself and question content are collaborators behind the
//! [`scheduler::QuestionDelivery`] trait.

pub mod config;
pub mod error;
pub mod reminders;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod tz;

pub use config::QuizConfig;
pub use error::{QuizError, Result};
pub use reminders::{ReminderPref, ReminderRegistry};
pub use runtime::QuizCore;
pub use scheduler::{JobQueue, QuestionDelivery, ReminderPayload};
pub use store::Store;
pub use tracker::{EngagementTracker, StreakRow, StreakSummary};
