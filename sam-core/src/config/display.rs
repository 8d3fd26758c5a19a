//! Message rendering configuration.

use chrono::{DateTime, Offset, TimeZone, Utc};
pub use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Zone event times are shown in.
    pub timezone: Tz,
}

impl DisplayConfig {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Offset of the display zone at `at`, daylight saving time included.
    pub fn offset_at(&self, at: OffsetDateTime) -> UtcOffset {
        let seconds = DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)
            .map(|utc| {
                self.timezone
                    .offset_from_utc_datetime(&utc.naive_utc())
                    .fix()
                    .local_minus_utc()
            })
            .unwrap_or(0);
        UtcOffset::from_whole_seconds(seconds).unwrap_or(UtcOffset::UTC)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { timezone: Tz::UTC }
    }
}
