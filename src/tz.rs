//! IANA timezone resolution and zone-local calendar dates.
//!
//! The store and tracker are purely date-string based; this module is the
//! single place where "now" is turned into a calendar date for a user's zone.

use chrono::Utc;
use chrono_tz::Tz;

/// Resolve an IANA zone name, falling back to `default` when the name is
/// unknown. Reminder scheduling degrades gracefully instead of failing.
pub fn resolve_zone(name: &str, default: Tz) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(zone = name, fallback = %default, "unknown timezone, using default");
            default
        }
    }
}

/// Today's calendar date in `tz`, formatted `YYYY-MM-DD`.
pub fn today_in_zone(tz: Tz) -> String {
    Utc::now()
        .with_timezone(&tz)
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
