use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SeenEventStore, StoreError};
use crate::entities::seen_event::SeenRecord;

/// Non-durable [`SeenEventStore`].
#[derive(Debug, Default)]
pub struct MemorySeenEventStore {
    records: RwLock<HashMap<String, SeenRecord>>,
}

impl MemorySeenEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `records`.
    pub fn with_records(records: impl IntoIterator<Item = SeenRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.event_id.clone(), r))
                    .collect(),
            ),
        }
    }

    /// Copy of the current contents, keyed by event id.
    pub async fn snapshot(&self) -> HashMap<String, SeenRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl SeenEventStore for MemorySeenEventStore {
    async fn get(&self, event_id: &str) -> Result<Option<SeenRecord>, StoreError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn upsert(&self, record: SeenRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.event_id.clone(), record);
        Ok(())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<SeenRecord>, StoreError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            b.notified_at
                .cmp(&a.notified_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(records
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.records.read().await.len() as i64)
    }
}
