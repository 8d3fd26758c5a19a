//! Poll loop timing.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Fixed delay between ticks.
    pub interval: Duration,
    /// Upper bound for one fetch from the event source.
    pub fetch_timeout: Duration,
    /// Upper bound for one notification, retries included.
    pub notify_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(15),
            notify_timeout: Duration::from_secs(30),
        }
    }
}
