//! PollDiffLoop: the fetch → diff → notify → persist pass.
//!
//! For each `PollTick`:
//! 1. Fetch the current listing. On failure the tick stops here and the
//!    store is left untouched.
//! 2. Classify every event against the store by fingerprint:
//!    absent → NEW, different → UPDATED, equal → UNCHANGED.
//! 3. Announce NEW and UPDATED events in fetch order. A failed announcement
//!    is logged and the batch continues.
//! 4. Record each announced event right after its delivery. Failed events
//!    are not recorded, so they are retried next tick. When the store
//!    refuses the record of an announced event, the record is kept in memory
//!    and used in place of the store's answer until a later tick writes it.
//!
//! Events missing from a fetch are left alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use sam_sdk::objects::{LoopState, TickSummary};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::event_source::{EventSource, SourceError};
use super::notifier::Notifier;
use crate::config::PollingConfig;
use crate::entities::seen_event::SeenRecord;
use crate::events::PollTickReceiver;
use crate::listing::{ChangeKind, Event, Fingerprint};
use crate::status::SharedLoopStatus;
use crate::store::SeenEventStore;

/// Counters of one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: u32,
    pub new: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Events neither announced nor recorded this tick.
    pub failed: u32,
    /// Events announced but not recorded.
    pub persist_failed: u32,
}

impl From<TickReport> for TickSummary {
    fn from(value: TickReport) -> Self {
        TickSummary {
            fetched: value.fetched,
            new: value.new,
            updated: value.updated,
            unchanged: value.unchanged,
            failed: value.failed,
            persist_failed: value.persist_failed,
        }
    }
}

/// Why a tick was skipped.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("event source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("event source did not answer within {0:?}")]
    SourceTimeout(Duration),
}

pub struct PollDiffLoop<S, N, St: ?Sized> {
    source: S,
    notifier: N,
    store: Arc<St>,
    polling: PollingConfig,
    status: SharedLoopStatus,
    /// Records of announced events the store has not accepted yet.
    pending: Mutex<HashMap<String, SeenRecord>>,
}

impl<S, N, St> PollDiffLoop<S, N, St>
where
    S: EventSource,
    N: Notifier,
    St: SeenEventStore + ?Sized,
{
    pub fn new(
        source: S,
        notifier: N,
        store: Arc<St>,
        polling: PollingConfig,
        status: SharedLoopStatus,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            polling,
            status,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Run until shutdown is signaled or the tick channel closes.
    ///
    /// Shutdown is only observed between ticks; a running tick completes.
    pub async fn run(
        self,
        mut tick_rx: PollTickReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("PollDiffLoop started");

        loop {
            tokio::select! {
                biased;

                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        info!("PollDiffLoop received shutdown signal");
                        break;
                    }
                }

                Some(tick) = tick_rx.recv() => {
                    debug!(seq = tick.seq, "Received PollTick");
                    match self.run_tick().await {
                        Ok(report) => info!(
                            seq = tick.seq,
                            fetched = report.fetched,
                            new = report.new,
                            updated = report.updated,
                            unchanged = report.unchanged,
                            failed = report.failed,
                            persist_failed = report.persist_failed,
                            "Tick complete"
                        ),
                        Err(e) => warn!(seq = tick.seq, error = %e, "Tick skipped"),
                    }
                }

                else => {
                    info!("PollTick channel closed");
                    break;
                }
            }
        }

        self.status.write().await.state = LoopState::Stopped;
        info!("PollDiffLoop shutdown complete");
    }

    /// Run exactly one fetch/diff/notify/persist pass.
    pub async fn run_tick(&self) -> Result<TickReport, TickError> {
        let started = OffsetDateTime::now_utc();
        let result = self.tick().await;

        let mut status = self.status.write().await;
        status.state = LoopState::Idle;
        status.ticks += 1;
        status.last_tick_at = Some(started);
        match &result {
            Ok(report) => {
                status.last_successful_tick_at = Some(started);
                status.consecutive_failures = 0;
                status.last_report = Some(*report);
                status.last_error = None;
            }
            Err(e) => {
                status.consecutive_failures += 1;
                status.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn tick(&self) -> Result<TickReport, TickError> {
        self.set_state(LoopState::Fetching).await;
        let fetch = tokio::time::timeout(self.polling.fetch_timeout, self.source.fetch_events());
        let events = match fetch.await {
            Ok(result) => result?,
            Err(_) => return Err(TickError::SourceTimeout(self.polling.fetch_timeout)),
        };

        self.flush_pending().await;

        let mut report = TickReport {
            fetched: events.len() as u32,
            ..Default::default()
        };

        self.set_state(LoopState::Diffing).await;
        let (changed, unchanged) = self.diff(events, &mut report).await;

        for (event, fingerprint, kind) in changed {
            self.set_state(LoopState::Notifying).await;
            let is_update = kind.is_update();
            let delivery = match tokio::time::timeout(
                self.polling.notify_timeout,
                self.notifier.notify(&event, kind.clone()),
            )
            .await
            {
                Ok(Ok(delivery)) => delivery,
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(
                        event_id = %event.id,
                        kind = %kind,
                        error = %e,
                        "Failed to announce event"
                    );
                    continue;
                }
                Err(_) => {
                    report.failed += 1;
                    error!(
                        event_id = %event.id,
                        kind = %kind,
                        timeout_secs = self.polling.notify_timeout.as_secs(),
                        "Announcing event timed out"
                    );
                    continue;
                }
            };

            if is_update {
                report.updated += 1;
            } else {
                report.new += 1;
            }
            info!(
                event_id = %event.id,
                kind = %kind,
                message_id = %delivery.message_id,
                "Announced event"
            );

            self.set_state(LoopState::Persisting).await;
            let record = SeenRecord {
                event_id: event.id.clone(),
                fingerprint: fingerprint.into_string(),
                notified_at: OffsetDateTime::now_utc(),
                message_id: Some(delivery.message_id),
            };
            match self.store.upsert(record.clone()).await {
                Ok(()) => {
                    self.pending.lock().await.remove(&event.id);
                }
                Err(e) => {
                    report.persist_failed += 1;
                    error!(
                        event_id = %event.id,
                        error = %e,
                        "Failed to record announced event, keeping it in memory"
                    );
                    self.pending.lock().await.insert(event.id.clone(), record);
                }
            }
        }

        if !unchanged.is_empty() {
            self.set_state(LoopState::Persisting).await;
        }
        for record in unchanged {
            let event_id = record.event_id.clone();
            match self.store.upsert(record).await {
                Ok(()) => {
                    self.pending.lock().await.remove(&event_id);
                }
                Err(e) => {
                    warn!(event_id = %event_id, error = %e, "Failed to rewrite unchanged record");
                }
            }
        }

        Ok(report)
    }

    /// Split the listing into events to announce and records to keep.
    async fn diff(
        &self,
        events: Vec<Event>,
        report: &mut TickReport,
    ) -> (Vec<(Event, Fingerprint, ChangeKind)>, Vec<SeenRecord>) {
        let mut changed = Vec::new();
        let mut unchanged = Vec::new();
        let mut seen_ids = HashSet::new();

        for event in events {
            if !seen_ids.insert(event.id.clone()) {
                warn!(event_id = %event.id, "Duplicate event in listing, ignoring repeat");
                continue;
            }

            let fingerprint = event.fingerprint();
            let pending = self.pending.lock().await.get(&event.id).cloned();
            let known = match pending {
                Some(record) => Ok(Some(record)),
                None => self.store.get(&event.id).await,
            };
            match known {
                Ok(None) => changed.push((event, fingerprint, ChangeKind::New)),
                Ok(Some(record)) if record.fingerprint == fingerprint.as_str() => {
                    report.unchanged += 1;
                    unchanged.push(record);
                }
                Ok(Some(record)) => changed.push((
                    event,
                    fingerprint,
                    ChangeKind::Updated {
                        previous_message: record.message_id,
                    },
                )),
                Err(e) => {
                    report.failed += 1;
                    error!(
                        event_id = %event.id,
                        error = %e,
                        "Seen-event lookup failed, skipping event"
                    );
                }
            }
        }

        (changed, unchanged)
    }

    /// Retry writing records the store refused on earlier ticks.
    async fn flush_pending(&self) {
        let records: Vec<SeenRecord> = self.pending.lock().await.values().cloned().collect();
        for record in records {
            let event_id = record.event_id.clone();
            match self.store.upsert(record).await {
                Ok(()) => {
                    self.pending.lock().await.remove(&event_id);
                    info!(event_id = %event_id, "Recorded kept announcement");
                }
                Err(e) => {
                    warn!(event_id = %event_id, error = %e, "Store still refuses kept record");
                }
            }
        }
    }

    async fn set_state(&self, state: LoopState) {
        self.status.write().await.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Delivery;
    use crate::processors::notifier::DeliveryError;
    use crate::status::shared_loop_status;
    use crate::store::{MemorySeenEventStore, StoreError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // -- Fakes --------------------------------------------------------------

    #[derive(Default)]
    struct ScriptedSource {
        responses: StdMutex<VecDeque<Result<Vec<Event>, SourceError>>>,
        hang: bool,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Event>, SourceError>>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn fetch_events(&self) -> Result<Vec<Event>, SourceError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail_for: HashSet<String>,
        hang_for: HashSet<String>,
        calls: StdMutex<Vec<(String, ChangeKind)>>,
    }

    impl RecordingNotifier {
        fn failing_for(ids: &[&str]) -> Self {
            Self {
                fail_for: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(String, ChangeKind)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &Event, kind: ChangeKind) -> Result<Delivery, DeliveryError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((event.id.clone(), kind));
                calls.len()
            };
            if self.hang_for.contains(&event.id) {
                std::future::pending::<()>().await;
            }
            if self.fail_for.contains(&event.id) {
                return Err(DeliveryError::Exhausted {
                    attempts: 3,
                    last: "503 Service Unavailable".to_string(),
                });
            }
            Ok(Delivery {
                message_id: format!("m{n}"),
            })
        }
    }

    /// Memory store whose lookups fail while `broken` is set and whose next
    /// `failing_upserts` writes fail.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemorySeenEventStore,
        broken: AtomicBool,
        failing_upserts: AtomicUsize,
    }

    #[async_trait]
    impl SeenEventStore for FaultyStore {
        async fn get(&self, event_id: &str) -> Result<Option<SeenRecord>, StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.get(event_id).await
        }

        async fn upsert(&self, record: SeenRecord) -> Result<(), StoreError> {
            let failing = self
                .failing_upserts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.upsert(record).await
        }

        async fn list(&self, limit: u32, offset: u32) -> Result<Vec<SeenRecord>, StoreError> {
            self.inner.list(limit, offset).await
        }

        async fn count(&self) -> Result<i64, StoreError> {
            self.inner.count().await
        }
    }

    // -- Helpers ------------------------------------------------------------

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            start: None,
            end: None,
            location: "OJD".to_string(),
            image: None,
            url: format!("https://peoply.app/events/{id}"),
            updated_at: None,
        }
    }

    fn seen(e: &Event, message: &str) -> SeenRecord {
        SeenRecord {
            event_id: e.id.clone(),
            fingerprint: e.fingerprint().into_string(),
            notified_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            message_id: Some(message.to_string()),
        }
    }

    fn poll_loop<St: SeenEventStore + ?Sized>(
        source: ScriptedSource,
        notifier: RecordingNotifier,
        store: Arc<St>,
    ) -> PollDiffLoop<ScriptedSource, RecordingNotifier, St> {
        PollDiffLoop::new(
            source,
            notifier,
            store,
            PollingConfig::default(),
            shared_loop_status(),
        )
    }

    async fn fingerprints(store: &MemorySeenEventStore) -> Vec<(String, String)> {
        let mut out: Vec<_> = store
            .snapshot()
            .await
            .into_values()
            .map(|r| (r.event_id, r.fingerprint))
            .collect();
        out.sort();
        out
    }

    // -- Scenarios ----------------------------------------------------------

    #[tokio::test]
    async fn test_new_event_is_announced_and_recorded() {
        let a = event("1", "A");
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![a.clone()])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(l.notifier.calls(), [("1".to_string(), ChangeKind::New)]);
        assert_eq!(
            fingerprints(&store).await,
            [("1".to_string(), a.fingerprint().into_string())]
        );
        assert_eq!(store.get("1").await.unwrap().unwrap().message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_unchanged_event_is_not_announced() {
        let a = event("1", "A");
        let before = seen(&a, "m0");
        let store = Arc::new(MemorySeenEventStore::with_records([before.clone()]));
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![a])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(l.notifier.calls().is_empty());
        assert_eq!(store.get("1").await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn test_changed_event_is_announced_as_update() {
        let old = event("1", "A");
        let new = event("1", "A (flyttet)");
        let store = Arc::new(MemorySeenEventStore::with_records([seen(&old, "m0")]));
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![new.clone()])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(
            l.notifier.calls(),
            [(
                "1".to_string(),
                ChangeKind::Updated {
                    previous_message: Some("m0".to_string())
                }
            )]
        );
        assert_eq!(
            fingerprints(&store).await,
            [("1".to_string(), new.fingerprint().into_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_untouched() {
        let a = event("1", "A");
        let before = seen(&a, "m0");
        let store = Arc::new(MemorySeenEventStore::with_records([before.clone()]));
        let l = poll_loop(
            ScriptedSource::new(vec![Err(SourceError::Http { status: 502 })]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let err = l.run_tick().await.unwrap_err();
        assert!(matches!(err, TickError::SourceUnavailable(SourceError::Http { status: 502 })));
        assert!(l.notifier.calls().is_empty());
        assert_eq!(store.snapshot().await.len(), 1);
        assert_eq!(store.get("1").await.unwrap(), Some(before));

        let status = l.status.read().await;
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_successful_tick_at.is_none());
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_recorded() {
        let a = event("1", "A");
        let b = event("2", "B");
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![a.clone(), b.clone()]), Ok(vec![a.clone(), b])]),
            RecordingNotifier::failing_for(&["2"]),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!((report.new, report.failed), (1, 1));
        assert_eq!(
            fingerprints(&store).await,
            [("1".to_string(), a.fingerprint().into_string())]
        );

        // B is retried on the next tick, A is not repeated.
        l.run_tick().await.unwrap();
        let ids: Vec<_> = l.notifier.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["1", "2", "2"]);
    }

    // -- Properties ---------------------------------------------------------

    #[tokio::test]
    async fn test_second_pass_over_same_listing_is_silent() {
        let listing = vec![event("1", "A"), event("2", "B"), event("3", "C")];
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(listing.clone()), Ok(listing)]),
            RecordingNotifier::default(),
            store.clone(),
        );

        assert_eq!(l.run_tick().await.unwrap().new, 3);
        let second = l.run_tick().await.unwrap();
        assert_eq!((second.new, second.updated, second.unchanged), (0, 0, 3));
        assert_eq!(l.notifier.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_announcements_follow_fetch_order() {
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("c", "C"), event("a", "A"), event("b", "B")])]),
            RecordingNotifier::default(),
            store,
        );

        l.run_tick().await.unwrap();
        let ids: Vec<_> = l.notifier.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_listing_announce_once() {
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("1", "A"), event("1", "A")])]),
            RecordingNotifier::default(),
            store,
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!((report.fetched, report.new), (2, 1));
        assert_eq!(l.notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_vanished_events_are_kept() {
        let a = event("1", "A");
        let store = Arc::new(MemorySeenEventStore::with_records([seen(&a, "m0")]));
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(Vec::new())]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!(report, TickReport::default());
        assert!(store.get("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_event() {
        let store = Arc::new(FaultyStore::default());
        store.broken.store(true, Ordering::SeqCst);
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("1", "A")]), Ok(vec![event("1", "A")])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!((report.new, report.failed), (0, 1));
        assert!(l.notifier.calls().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);

        store.broken.store(false, Ordering::SeqCst);
        assert_eq!(l.run_tick().await.unwrap().new, 1);
    }

    #[tokio::test]
    async fn test_unrecorded_announcement_is_not_repeated() {
        let a = event("1", "A");
        let store = Arc::new(FaultyStore::default());
        store.failing_upserts.store(1, Ordering::SeqCst);
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![a.clone()]), Ok(vec![a.clone()])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        let first = l.run_tick().await.unwrap();
        assert_eq!((first.new, first.persist_failed), (1, 1));
        assert_eq!(store.count().await.unwrap(), 0);

        let second = l.run_tick().await.unwrap();
        assert_eq!((second.new, second.updated, second.unchanged), (0, 0, 1));
        assert_eq!(l.notifier.calls().len(), 1);

        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.fingerprint, a.fingerprint().into_string());
        assert_eq!(record.message_id.as_deref(), Some("m1"));
        assert!(l.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrecorded_announcement_is_edited_when_changed() {
        let old = event("1", "A");
        let new = event("1", "A (flyttet)");
        let store = Arc::new(FaultyStore::default());
        // The first record write and the retry at the start of tick two fail.
        store.failing_upserts.store(2, Ordering::SeqCst);
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![old]), Ok(vec![new.clone()])]),
            RecordingNotifier::default(),
            store.clone(),
        );

        assert_eq!(l.run_tick().await.unwrap().persist_failed, 1);
        let second = l.run_tick().await.unwrap();
        assert_eq!((second.new, second.updated, second.persist_failed), (0, 1, 0));
        assert_eq!(
            l.notifier.calls()[1],
            (
                "1".to_string(),
                ChangeKind::Updated {
                    previous_message: Some("m1".to_string())
                }
            )
        );

        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.fingerprint, new.fingerprint().into_string());
        assert_eq!(record.message_id.as_deref(), Some("m2"));
        assert!(l.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_leaves_store_unchanged_for_fetch_failure() {
        let store = Arc::new(FaultyStore::default());
        store.failing_upserts.store(1, Ordering::SeqCst);
        let l = poll_loop(
            ScriptedSource::new(vec![
                Ok(vec![event("1", "A")]),
                Err(SourceError::Http { status: 503 }),
            ]),
            RecordingNotifier::default(),
            store.clone(),
        );

        l.run_tick().await.unwrap();
        assert!(l.run_tick().await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(l.pending.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_notifier_times_out_and_batch_continues() {
        let store = Arc::new(MemorySeenEventStore::new());
        let notifier = RecordingNotifier {
            hang_for: ["1".to_string()].into(),
            ..Default::default()
        };
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("1", "A"), event("2", "B")])]),
            notifier,
            store.clone(),
        );

        let report = l.run_tick().await.unwrap();
        assert_eq!((report.new, report.failed), (1, 1));
        assert!(store.get("1").await.unwrap().is_none());
        assert!(store.get("2").await.unwrap().is_some());
        let ids: Vec<_> = l.notifier.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let source = ScriptedSource {
            hang: true,
            ..Default::default()
        };
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(source, RecordingNotifier::default(), store);

        let err = l.run_tick().await.unwrap_err();
        assert!(matches!(err, TickError::SourceTimeout(d) if d == Duration::from_secs(15)));
        assert_eq!(l.status.read().await.state, LoopState::Idle);
    }

    #[tokio::test]
    async fn test_works_through_dyn_store() {
        let store: Arc<dyn SeenEventStore> = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("1", "A")])]),
            RecordingNotifier::default(),
            store.clone(),
        );
        l.run_tick().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_processes_ticks_until_shutdown() {
        let store = Arc::new(MemorySeenEventStore::new());
        let l = poll_loop(
            ScriptedSource::new(vec![Ok(vec![event("1", "A")])]),
            RecordingNotifier::default(),
            store.clone(),
        );
        let status = l.status.clone();
        let (tick_tx, tick_rx) = crate::events::poll_tick_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(l.run(tick_rx, shutdown_rx));

        tick_tx
            .send(crate::events::PollTick {
                seq: 1,
                scheduled_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
        while status.read().await.ticks == 0 {
            tokio::task::yield_now().await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(status.read().await.state, LoopState::Stopped);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
