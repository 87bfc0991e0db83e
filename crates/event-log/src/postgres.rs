use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{AggregateId, EventKind, SequenceNumber, Version};

use crate::{
    Event, EventId, EventLogError, Result,
    log::{EventLog, EventStream},
};

const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id UUID PRIMARY KEY,
    aggregate_id TEXT NOT NULL,
    sequence BIGINT NOT NULL,
    kind TEXT NOT NULL,
    payload JSONB NOT NULL,
    caused_by_version BIGINT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    CONSTRAINT unique_aggregate_sequence UNIQUE (aggregate_id, sequence)
);
CREATE INDEX IF NOT EXISTS idx_events_kind ON events (kind);
"#;

/// PostgreSQL-backed event log.
///
/// Persists the minimal layout needed to replay every aggregate:
/// `(aggregate_id, sequence, kind, payload, caused_by_version, timestamp)`.
/// The `UNIQUE (aggregate_id, sequence)` constraint keeps sequences
/// gapless even when multiple processes share the table.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the events table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_EVENTS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        Ok(Event {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sequence: SequenceNumber::new(row.try_get("sequence")?),
            aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
            kind: EventKind::new(row.try_get::<String, _>("kind")?),
            payload: row.try_get("payload")?,
            caused_by_version: Version::new(row.try_get("caused_by_version")?),
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        kind: EventKind,
        payload: serde_json::Value,
        caused_by_version: Version,
    ) -> Result<Event> {
        let mut tx = self.pool.begin().await?;

        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(&mut *tx)
                .await?;
        let sequence = SequenceNumber::new(last.unwrap_or(0) + 1);

        let event = Event::record(
            sequence,
            aggregate_id.clone(),
            kind,
            payload,
            caused_by_version,
        );

        sqlx::query(
            r#"
            INSERT INTO events (id, aggregate_id, sequence, kind, payload, caused_by_version, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(event.aggregate_id.as_str())
        .bind(event.sequence.as_i64())
        .bind(event.kind.as_str())
        .bind(&event.payload)
        .bind(event.caused_by_version.as_i64())
        .bind(event.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // A unique violation means another writer took this sequence slot.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_aggregate_sequence")
            {
                return EventLogError::SequenceConflict {
                    aggregate_id: event.aggregate_id.clone(),
                    sequence: event.sequence,
                };
            }
            EventLogError::Database(e)
        })?;

        tx.commit().await?;

        metrics::counter!("event_log_appends_total").increment(1);
        Ok(event)
    }

    async fn replay(&self, aggregate_id: &AggregateId) -> Result<EventStream> {
        let stream = sqlx::query(
            r#"
            SELECT id, aggregate_id, sequence, kind, payload, caused_by_version, timestamp
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(aggregate_id.as_str().to_string())
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventLogError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, sequence, kind, payload, caused_by_version, timestamp
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(aggregate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn events_by_kind(&self, kind: &EventKind) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, sequence, kind, payload, caused_by_version, timestamp
            FROM events
            WHERE kind = $1
            ORDER BY timestamp ASC, sequence ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn last_sequence(&self, aggregate_id: &AggregateId) -> Result<Option<SequenceNumber>> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(last.map(SequenceNumber::new))
    }

    async fn aggregate_ids(&self) -> Result<Vec<AggregateId>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT aggregate_id FROM events ORDER BY aggregate_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(AggregateId::new).collect())
    }
}
