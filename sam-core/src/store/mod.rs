//! Seen-event store.
//!
//! Durable mapping from event identity to the fingerprint last announced.
//! The poll loop is the only writer; the status API only reads.

mod memory;
mod sqlite;

pub use memory::MemorySeenEventStore;
pub use sqlite::{MEMORY_PATH, SqliteSeenEventStore};

use crate::entities::seen_event::SeenRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait SeenEventStore: Send + Sync {
    /// Record for `event_id`, `None` when it was never announced.
    async fn get(&self, event_id: &str) -> Result<Option<SeenRecord>, StoreError>;

    /// Insert or overwrite the record for `record.event_id`. Last write wins.
    async fn upsert(&self, record: SeenRecord) -> Result<(), StoreError>;

    /// Page of records, most recently notified first.
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<SeenRecord>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}
