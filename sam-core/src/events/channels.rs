//! Tick channel factory.

use super::types::PollTick;
use tokio::sync::mpsc;

/// At most one tick waits while a pass is running; further ticks are
/// dropped by the scheduler instead of piling up.
pub const POLL_TICK_BUFFER: usize = 1;

pub type PollTickSender = mpsc::Sender<PollTick>;
pub type PollTickReceiver = mpsc::Receiver<PollTick>;

/// Create the channel between the scheduler and the poll loop.
pub fn poll_tick_channel() -> (PollTickSender, PollTickReceiver) {
    mpsc::channel(POLL_TICK_BUFFER)
}
