use std::str::FromStr;

use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use super::{SeenEventStore, StoreError};
use crate::entities::seen_event::{
    CountSeenEvents, GetSeenEvent, ListSeenEvents, SeenRecord, UpsertSeenEvent,
};
use crate::framework::DatabaseProcessor;

/// Path value selecting a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// [`SeenEventStore`] backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteSeenEventStore {
    db: DatabaseProcessor,
}

impl SqliteSeenEventStore {
    /// Open (creating if needed) the database at `path` and apply migrations.
    ///
    /// `":memory:"` opens a throwaway database that lives as long as the store.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let (options, max_connections) = if path == MEMORY_PATH {
            (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
        } else {
            (
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
                4,
            )
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            // An in-memory database disappears with its last connection.
            .min_connections(if path == MEMORY_PATH { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("../migrations").run(&pool).await?;
        info!(path = %path, "Seen-event store ready");

        Ok(Self {
            db: DatabaseProcessor { pool },
        })
    }

    pub async fn close(&self) {
        self.db.pool.close().await;
    }
}

#[async_trait]
impl SeenEventStore for SqliteSeenEventStore {
    async fn get(&self, event_id: &str) -> Result<Option<SeenRecord>, StoreError> {
        Ok(self
            .db
            .process(GetSeenEvent {
                event_id: event_id.to_string(),
            })
            .await?)
    }

    async fn upsert(&self, record: SeenRecord) -> Result<(), StoreError> {
        Ok(self.db.process(UpsertSeenEvent { record }).await?)
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<SeenRecord>, StoreError> {
        Ok(self.db.process(ListSeenEvents { limit, offset }).await?)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.db.process(CountSeenEvents).await?)
    }
}
