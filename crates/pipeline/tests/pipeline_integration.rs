//! End-to-end pipeline tests: commands through the coordinator, event
//! sourcing round trips, and contention behavior.

use std::sync::Arc;

use aggregate_store::{AggregateState, OrderStatus, ValidationError};
use common::{AggregateId, EventKind, Version};
use event_log::{EventLog, EventLogExt, InMemoryEventLog};
use pipeline::{Command, Coordinator, PipelineConfig, PipelineError, fold_replay};

struct CreateOrder {
    id: AggregateId,
}

impl Command for CreateOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.id
    }

    fn expected_version(&self) -> Option<Version> {
        None
    }

    fn kind(&self) -> EventKind {
        EventKind::order_created()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        Ok(state
            .clone()
            .with_status(OrderStatus::Created)
            .with_field("customer_id", serde_json::json!("CUST-1"))
            .with_field("total_cents", serde_json::json!(2500)))
    }
}

struct Touch {
    id: AggregateId,
    expected: Option<Version>,
    tag: i64,
}

impl Command for Touch {
    fn aggregate_id(&self) -> &AggregateId {
        &self.id
    }

    fn expected_version(&self) -> Option<Version> {
        self.expected
    }

    fn kind(&self) -> EventKind {
        EventKind::new("TOUCHED")
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        let mut next = state.clone();
        next.set_field(format!("tag_{}", self.tag), serde_json::json!(self.tag));
        Ok(next)
    }
}

fn coordinator() -> (Coordinator, Arc<InMemoryEventLog>) {
    let log = Arc::new(InMemoryEventLog::new());
    let coordinator = Coordinator::new(Arc::clone(&log) as Arc<dyn EventLog>);
    (coordinator, log)
}

#[tokio::test]
async fn version_after_n_commits_is_n() {
    let (coordinator, _) = coordinator();
    let id = AggregateId::new("ORD-1");

    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();
    for i in 1..8 {
        coordinator
            .submit(&Touch {
                id: id.clone(),
                expected: Some(Version::new(i)),
                tag: i,
            })
            .await
            .unwrap();
    }

    let aggregate = coordinator.get(&id).await.unwrap();
    assert_eq!(aggregate.version, Version::new(8));
}

#[tokio::test]
async fn sequences_are_gapless_and_match_versions() {
    let (coordinator, log) = coordinator();
    let id = AggregateId::new("ORD-1");

    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();
    for i in 1..5 {
        coordinator
            .submit(&Touch {
                id: id.clone(),
                expected: Some(Version::new(i)),
                tag: i,
            })
            .await
            .unwrap();
    }

    let events = log.events_for(&id).await.unwrap();
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence.as_i64(), i as i64 + 1);
        assert_eq!(event.caused_by_version.as_i64(), i as i64 + 1);
    }
}

#[tokio::test]
async fn event_sourcing_round_trip_after_commits_and_undo() {
    let (coordinator, log) = coordinator();
    let id = AggregateId::new("ORD-1");

    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();
    coordinator
        .submit(&Touch {
            id: id.clone(),
            expected: Some(Version::first()),
            tag: 1,
        })
        .await
        .unwrap();
    coordinator.undo(&id).await.unwrap();

    let aggregate = coordinator.get(&id).await.unwrap();
    let (folded_state, folded_version) =
        fold_replay(log.as_ref(), &id).await.unwrap().unwrap();

    assert_eq!(folded_version, aggregate.version);
    assert_eq!(folded_state, aggregate.state);
}

#[tokio::test]
async fn rehydrated_coordinator_serves_identical_state() {
    let (coordinator, log) = coordinator();
    let id = AggregateId::new("ORD-1");

    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();
    coordinator
        .submit(&Touch {
            id: id.clone(),
            expected: Some(Version::first()),
            tag: 7,
        })
        .await
        .unwrap();
    let before = coordinator.get(&id).await.unwrap();

    let rebuilt = Coordinator::rehydrate(
        Arc::clone(&log) as Arc<dyn EventLog>,
        PipelineConfig::default(),
    )
    .await
    .unwrap();
    let after = rebuilt.get(&id).await.unwrap();

    assert_eq!(after.version, before.version);
    assert_eq!(after.state, before.state);

    // The rebuilt coordinator keeps accepting commands where the old one
    // left off.
    rebuilt
        .submit(&Touch {
            id: id.clone(),
            expected: Some(after.version),
            tag: 8,
        })
        .await
        .unwrap();
    assert_eq!(rebuilt.get(&id).await.unwrap().version, Version::new(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contending_submitters_all_land_through_retries() {
    let log = Arc::new(InMemoryEventLog::new());
    let coordinator = Arc::new(Coordinator::new(Arc::clone(&log) as Arc<dyn EventLog>));
    let id = AggregateId::new("ORD-1");
    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(4));
    let mut handles = Vec::new();
    for tag in 0..4 {
        let coordinator = Arc::clone(&coordinator);
        let id = id.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            // Everyone reads the same version, so all but one conflict
            // and resolve through retries.
            let current = coordinator.get(&id).await.unwrap();
            coordinator
                .submit(&Touch {
                    id: id.clone(),
                    expected: Some(current.version),
                    tag,
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let aggregate = coordinator.get(&id).await.unwrap();
    assert_eq!(aggregate.version, Version::new(5));

    let events = log.events_for(&id).await.unwrap();
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence.as_i64(), i as i64 + 1);
    }
}

#[tokio::test]
async fn stale_submission_leaves_aggregate_at_last_committed_version() {
    let (coordinator, log) = coordinator();
    let id = AggregateId::new("ORD-1");
    coordinator.submit(&CreateOrder { id: id.clone() }).await.unwrap();

    struct ReserveOnce {
        id: AggregateId,
        expected: Option<Version>,
    }
    impl Command for ReserveOnce {
        fn aggregate_id(&self) -> &AggregateId {
            &self.id
        }
        fn expected_version(&self) -> Option<Version> {
            self.expected
        }
        fn kind(&self) -> EventKind {
            EventKind::inventory_checked()
        }
        fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
            if !state.status.can_reserve() {
                return Err(ValidationError::new("already reserved"));
            }
            Ok(state.clone().with_status(OrderStatus::InventoryReserved))
        }
    }

    coordinator
        .submit(&ReserveOnce {
            id: id.clone(),
            expected: Some(Version::first()),
        })
        .await
        .unwrap();

    let result = coordinator
        .submit(&ReserveOnce {
            id: id.clone(),
            expected: Some(Version::first()),
        })
        .await;
    assert!(matches!(result, Err(PipelineError::Conflict { .. })));

    let aggregate = coordinator.get(&id).await.unwrap();
    assert_eq!(aggregate.version, Version::new(2));
    assert_eq!(log.event_count_for(&id).await.unwrap(), 2);
}
