//! TickScheduler: emits `PollTick` on a fixed interval.
//!
//! The first tick fires immediately. When the poll loop is still busy the
//! tick is dropped rather than queued, so a slow pass never causes a burst
//! of back-to-back passes afterwards.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::{PollTick, PollTickSender};

pub struct TickScheduler {
    interval: Duration,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run until shutdown is signaled or the poll loop goes away.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, tick_tx: PollTickSender) {
        info!(interval_secs = self.interval.as_secs(), "TickScheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = 0u64;

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        info!("TickScheduler received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    seq += 1;
                    let tick = PollTick {
                        seq,
                        scheduled_at: OffsetDateTime::now_utc(),
                    };
                    match tick_tx.try_send(tick) {
                        Ok(()) => debug!(seq, "Emitted PollTick"),
                        Err(TrySendError::Full(_)) => {
                            debug!(seq, "Poll loop busy, dropping PollTick");
                        }
                        Err(TrySendError::Closed(_)) => {
                            warn!("PollTick receiver dropped");
                            break;
                        }
                    }
                }
            }
        }

        info!("TickScheduler shutdown complete");
    }
}
