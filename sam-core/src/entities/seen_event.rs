use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sam_sdk::objects::SeenEventResponse;
use time::OffsetDateTime;

/// What the store remembers about an announced event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRecord {
    pub event_id: String,
    pub fingerprint: String,
    pub notified_at: OffsetDateTime,
    /// Chat message of the last announcement.
    pub message_id: Option<String>,
}

impl From<SeenRecord> for SeenEventResponse {
    fn from(value: SeenRecord) -> Self {
        SeenEventResponse {
            event_id: value.event_id,
            fingerprint: value.fingerprint,
            notified_at: value.notified_at.unix_timestamp(),
            message_id: value.message_id,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SeenEventRow {
    event_id: String,
    fingerprint: String,
    notified_at: i64,
    message_id: Option<String>,
}

impl TryFrom<SeenEventRow> for SeenRecord {
    type Error = sqlx::Error;

    fn try_from(row: SeenEventRow) -> Result<Self, Self::Error> {
        let notified_at = OffsetDateTime::from_unix_timestamp(row.notified_at)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(SeenRecord {
            event_id: row.event_id,
            fingerprint: row.fingerprint,
            notified_at,
            message_id: row.message_id,
        })
    }
}

#[derive(Debug, Clone)]
/// Look up the seen record of one event.
pub struct GetSeenEvent {
    pub event_id: String,
}

impl Processor<GetSeenEvent> for DatabaseProcessor {
    type Output = Option<SeenRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSeenEvent")]
    async fn process(&self, query: GetSeenEvent) -> Result<Option<SeenRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, SeenEventRow>(
            r#"
            SELECT event_id, fingerprint, notified_at, message_id
            FROM seen_events
            WHERE event_id = ?
            "#,
        )
        .bind(query.event_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SeenRecord::try_from).transpose()
    }
}

#[derive(Debug, Clone)]
/// Insert or replace the seen record of one event.
///
/// Single statement, so a crash never leaves a half-written record.
pub struct UpsertSeenEvent {
    pub record: SeenRecord,
}

impl Processor<UpsertSeenEvent> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertSeenEvent")]
    async fn process(&self, insert: UpsertSeenEvent) -> Result<(), sqlx::Error> {
        let SeenRecord {
            event_id,
            fingerprint,
            notified_at,
            message_id,
        } = insert.record;
        sqlx::query(
            r#"
            INSERT INTO seen_events (event_id, fingerprint, notified_at, message_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (event_id) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                notified_at = excluded.notified_at,
                message_id = excluded.message_id
            "#,
        )
        .bind(event_id)
        .bind(fingerprint)
        .bind(notified_at.unix_timestamp())
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Page through seen records, most recently notified first.
pub struct ListSeenEvents {
    pub limit: u32,
    pub offset: u32,
}

impl Processor<ListSeenEvents> for DatabaseProcessor {
    type Output = Vec<SeenRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSeenEvents")]
    async fn process(&self, query: ListSeenEvents) -> Result<Vec<SeenRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SeenEventRow>(
            r#"
            SELECT event_id, fingerprint, notified_at, message_id
            FROM seen_events
            ORDER BY notified_at DESC, event_id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SeenRecord::try_from).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CountSeenEvents;

impl Processor<CountSeenEvents> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountSeenEvents")]
    async fn process(&self, _query: CountSeenEvents) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
