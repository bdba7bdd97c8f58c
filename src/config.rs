//! Configuration types for the quizstreak core.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};
use crate::tz::resolve_zone;

/// Database filename used when no explicit path is configured.
const DB_FILENAME: &str = "quiz_scores.db";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Zone used when a stored timezone name cannot be resolved.
    pub default_timezone: String,
    /// Questions per calendar day before the day counts as complete.
    pub daily_quota: i64,
    /// Reminder scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl Default for QuizConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: data_dir.join("quizstreak").join(DB_FILENAME),
            default_timezone: "Asia/Kolkata".to_owned(),
            daily_quota: 5,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl QuizConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| QuizError::Config(format!("{}: {e}", path.display())))
    }

    /// The configured default zone, resolved. Falls back to Asia/Kolkata
    /// if the configured name itself is invalid.
    pub fn default_tz(&self) -> Tz {
        resolve_zone(&self.default_timezone, chrono_tz::Asia::Kolkata)
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between job-queue ticks.
    pub tick_secs: u64,
    /// Delay for the one-shot confirmation probe sent after a reminder is
    /// (re)configured, so the user sees the fire path work immediately.
    pub probe_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1,
            probe_delay_secs: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = QuizConfig::default();
        assert_eq!(cfg.daily_quota, 5);
        assert_eq!(cfg.default_timezone, "Asia/Kolkata");
        assert_eq!(cfg.scheduler.probe_delay_secs, 2);
        assert!(cfg.db_path.ends_with("quizstreak/quiz_scores.db"));
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("quizstreak.toml");
        std::fs::write(&path, "daily_quota = 3\n[scheduler]\ntick_secs = 5\n").expect("write");

        let cfg = QuizConfig::load(&path).expect("load");
        assert_eq!(cfg.daily_quota, 3);
        assert_eq!(cfg.scheduler.tick_secs, 5);
        assert_eq!(cfg.scheduler.probe_delay_secs, 2);
        assert_eq!(cfg.default_timezone, "Asia/Kolkata");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "daily_quota = [nonsense").expect("write");

        let err = QuizConfig::load(&path).expect_err("should fail");
        assert!(matches!(err, QuizError::Config(_)));
    }

    #[test]
    fn invalid_default_timezone_still_resolves() {
        let cfg = QuizConfig {
            default_timezone: "Bad/Zone".to_owned(),
            ..QuizConfig::default()
        };
        assert_eq!(cfg.default_tz(), chrono_tz::Asia::Kolkata);
    }
}
