//! Rebuilding aggregate state from the event log.
//!
//! The log is the single source of truth: every committed event carries
//! the full resulting aggregate state, so folding a replay reduces to
//! taking the last event (last-writer-wins). The store is only a cache
//! and can be regenerated from the log alone.

use futures_util::StreamExt;

use aggregate_store::{Aggregate, AggregateState, AggregateStore};
use common::{AggregateId, Version};
use event_log::{Event, EventLog};

use crate::error::Result;

/// Folds an ordered event sequence into the aggregate state and version
/// it produces. Returns `None` for an empty sequence.
pub fn fold(events: &[Event]) -> Result<Option<(AggregateState, Version)>> {
    let Some(last) = events.last() else {
        return Ok(None);
    };
    let state: AggregateState = serde_json::from_value(last.payload.clone())?;
    Ok(Some((state, last.caused_by_version)))
}

/// Replays one aggregate from the log and folds the result.
///
/// This is the event-sourcing round trip: for any aggregate mutated only
/// through the pipeline, `fold_replay` reproduces exactly the state and
/// version held by the store.
pub async fn fold_replay(
    log: &dyn EventLog,
    aggregate_id: &AggregateId,
) -> Result<Option<(AggregateState, Version)>> {
    let mut stream = log.replay(aggregate_id).await?;
    let mut last: Option<Event> = None;
    while let Some(event) = stream.next().await {
        last = Some(event?);
    }

    match last {
        Some(event) => {
            let state: AggregateState = serde_json::from_value(event.payload.clone())?;
            Ok(Some((state, event.caused_by_version)))
        }
        None => Ok(None),
    }
}

/// Reconstructs a fresh aggregate store from the log alone.
pub async fn rebuild_store(log: &dyn EventLog) -> Result<AggregateStore> {
    let store = AggregateStore::new();

    for id in log.aggregate_ids().await? {
        let mut stream = log.replay(&id).await?;
        let mut last: Option<Event> = None;
        while let Some(event) = stream.next().await {
            last = Some(event?);
        }

        if let Some(event) = last {
            let state: AggregateState = serde_json::from_value(event.payload.clone())?;
            store
                .restore(Aggregate {
                    id: id.clone(),
                    state,
                    version: event.caused_by_version,
                    updated_at: event.timestamp,
                })
                .await;
        }
    }

    tracing::info!(
        aggregates = store.aggregate_count().await,
        "store rebuilt from event log"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::EventKind;
    use event_log::InMemoryEventLog;

    #[tokio::test]
    async fn fold_of_empty_log_is_none() {
        let log = InMemoryEventLog::new();
        let result = fold_replay(&log, &AggregateId::new("missing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fold_takes_last_event() {
        let log = InMemoryEventLog::new();
        let id = AggregateId::new("ORD-1");

        let first = AggregateState::default().with_field("step", serde_json::json!(1));
        let second = AggregateState::default().with_field("step", serde_json::json!(2));

        log.append(
            &id,
            EventKind::order_created(),
            serde_json::to_value(&first).unwrap(),
            Version::first(),
        )
        .await
        .unwrap();
        log.append(
            &id,
            EventKind::new("FIELD_SET"),
            serde_json::to_value(&second).unwrap(),
            Version::new(2),
        )
        .await
        .unwrap();

        let (state, version) = fold_replay(&log, &id).await.unwrap().unwrap();
        assert_eq!(version, Version::new(2));
        assert_eq!(state, second);

        let events = log.events_for(&id).await.unwrap();
        assert_eq!(fold(&events).unwrap().unwrap().1, Version::new(2));
    }

    #[tokio::test]
    async fn rebuild_restores_every_aggregate() {
        let log = InMemoryEventLog::new();
        for n in 0..3 {
            let id = AggregateId::new(format!("ORD-{n}"));
            let state = AggregateState::default().with_field("n", serde_json::json!(n));
            log.append(
                &id,
                EventKind::order_created(),
                serde_json::to_value(&state).unwrap(),
                Version::first(),
            )
            .await
            .unwrap();
        }

        let store = rebuild_store(&log).await.unwrap();
        assert_eq!(store.aggregate_count().await, 3);

        let aggregate = store.get(&AggregateId::new("ORD-2")).await.unwrap();
        assert_eq!(aggregate.version, Version::first());
        assert_eq!(aggregate.field("n"), Some(&serde_json::json!(2)));
    }
}
