use std::time::Duration;

use chrono::Utc;

pub(crate) struct PiChainTime;

impl PiChainTime {
    /// Milliseconds since the unix epoch.
    pub(crate) fn now() -> u64 {
        Utc::now().timestamp_millis() as u64
    }

    /// Round trip time in seconds, rounded to millisecond precision, for a probe sent at `sent_at`.
    pub(crate) fn round_trip_since(sent_at: u64) -> f64 {
        let elapsed = Self::now().saturating_sub(sent_at);
        Duration::from_millis(elapsed).as_secs_f64()
    }
}
