//! Time helpers for tick timestamps and hold timers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp of a tick.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whether at least `duration` has passed between `since` and `now`.
///
/// A clock that went backwards counts as no time elapsed.
#[must_use]
pub fn has_elapsed(since: Timestamp, now: Timestamp, duration: TimeDelta) -> bool {
    now.signed_duration_since(since) >= duration
}
