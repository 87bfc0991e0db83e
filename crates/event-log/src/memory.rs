use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{AggregateId, EventKind, SequenceNumber, Version};

use crate::{
    Event, Result,
    log::{EventLog, EventStream},
};

/// In-memory event log.
///
/// Events are kept in a single append-ordered vector; per-aggregate views
/// are derived by filtering. Sequence assignment happens under the write
/// lock, which keeps sequences gapless under concurrent appends.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<Event>>>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all aggregates.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns every event in append order.
    pub async fn all_events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        kind: EventKind,
        payload: serde_json::Value,
        caused_by_version: Version,
    ) -> Result<Event> {
        let mut events = self.events.write().await;

        let sequence = events
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .map(|e| e.sequence)
            .max()
            .map(|seq| seq.next())
            .unwrap_or_else(SequenceNumber::first);

        let event = Event::record(sequence, aggregate_id.clone(), kind, payload, caused_by_version);
        events.push(event.clone());

        metrics::counter!("event_log_appends_total").increment(1);
        tracing::debug!(
            aggregate_id = %event.aggregate_id,
            sequence = %event.sequence,
            kind = %event.kind,
            "event appended"
        );

        Ok(event)
    }

    async fn replay(&self, aggregate_id: &AggregateId) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.events_for(aggregate_id).await?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut matching: Vec<_> = events
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.sequence);
        Ok(matching)
    }

    async fn events_by_kind(&self, kind: &EventKind) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|e| &e.kind == kind).cloned().collect())
    }

    async fn last_sequence(&self, aggregate_id: &AggregateId) -> Result<Option<SequenceNumber>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .map(|e| e.sequence)
            .max())
    }

    async fn aggregate_ids(&self) -> Result<Vec<AggregateId>> {
        let events = self.events.read().await;
        let ids: BTreeSet<_> = events.iter().map(|e| e.aggregate_id.clone()).collect();
        Ok(ids.into_iter().collect())
    }
}
