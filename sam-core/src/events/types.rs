use time::OffsetDateTime;

/// Request for one poll-loop pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    /// Sequence number assigned by the scheduler, starting at 1.
    pub seq: u64,
    pub scheduled_at: OffsetDateTime,
}
