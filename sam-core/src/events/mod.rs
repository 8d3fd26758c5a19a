//! Tick events driving the poll loop.
//!
//! # Event Flow
//!
//! 1. `TickScheduler` emits `PollTick` on a fixed interval
//! 2. `PollDiffLoop` receives `PollTick` and runs one fetch/diff/notify/persist pass
//!
//! Tests skip the scheduler and call `PollDiffLoop::run_tick` directly.

pub mod channels;
pub mod types;

pub use channels::{POLL_TICK_BUFFER, PollTickReceiver, PollTickSender, poll_tick_channel};
pub use types::PollTick;
