//! Loop status shared between the poll loop and the status API.

use std::sync::Arc;

use sam_sdk::objects::LoopState;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::processors::poll_loop::TickReport;

/// Snapshot of what the poll loop is doing and how it has fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopStatus {
    pub state: LoopState,
    pub started_at: OffsetDateTime,
    pub last_tick_at: Option<OffsetDateTime>,
    pub last_successful_tick_at: Option<OffsetDateTime>,
    pub ticks: u64,
    pub consecutive_failures: u32,
    pub last_report: Option<TickReport>,
    pub last_error: Option<String>,
}

impl LoopStatus {
    pub fn new(started_at: OffsetDateTime) -> Self {
        Self {
            state: LoopState::Idle,
            started_at,
            last_tick_at: None,
            last_successful_tick_at: None,
            ticks: 0,
            consecutive_failures: 0,
            last_report: None,
            last_error: None,
        }
    }
}

/// Written by the poll loop only.
pub type SharedLoopStatus = Arc<RwLock<LoopStatus>>;

pub fn shared_loop_status() -> SharedLoopStatus {
    Arc::new(RwLock::new(LoopStatus::new(OffsetDateTime::now_utc())))
}
