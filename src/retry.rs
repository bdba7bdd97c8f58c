//! Bounded retry with linear backoff.
//!
//! Used only by the corruption-recovery path in the store; normal
//! transactional operations fail fast and surface their errors.

use std::time::Duration;

/// Run `op` up to `attempts` times, sleeping `base_delay * attempt` between
/// failures. Returns the first success or the last error.
///
/// `attempts` is clamped to at least 1.
pub fn retry_backoff<T, E>(
    attempts: u32,
    base_delay: Duration,
    mut op: impl FnMut() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(_) => {
                std::thread::sleep(base_delay * attempt);
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
