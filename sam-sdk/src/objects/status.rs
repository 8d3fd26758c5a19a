//! Status API response types.
//!
//! Timestamps are unix seconds (UTC).

use serde::{Deserialize, Serialize};

/// Where the poll loop currently is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Fetching,
    Diffing,
    Notifying,
    Persisting,
    Stopped,
}

/// Counters of a single completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub fetched: u32,
    pub new: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Notifications that failed and will be retried next tick.
    pub failed: u32,
    /// Events delivered but whose seen record could not be written.
    pub persist_failed: u32,
}

/// `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub organization: String,
    pub state: LoopState,
    pub started_at: i64,
    pub last_tick_at: Option<i64>,
    pub last_successful_tick_at: Option<i64>,
    pub ticks: u64,
    pub consecutive_failures: u32,
    pub last_tick: Option<TickSummary>,
    pub last_error: Option<String>,
    /// `None` when the store could not be read.
    pub seen_events: Option<i64>,
}

/// One entry of `GET /events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEventResponse {
    pub event_id: String,
    pub fingerprint: String,
    pub notified_at: i64,
    pub message_id: Option<String>,
}

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

/// Query parameters of `GET /events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ListEventsQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ListEventsQuery {
    /// Limit clamped to `1..=500`.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
