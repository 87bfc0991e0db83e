//! The versioned aggregate store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use common::{AggregateId, Version};

use crate::aggregate::{Aggregate, AggregateState};
use crate::error::{Result, StoreError, ValidationError};

/// Outcome of a successful commit.
///
/// Carries the pre-commit state alongside the new aggregate so callers
/// can maintain undo history without a second read.
#[derive(Debug, Clone)]
pub struct Committed {
    /// The aggregate after the commit.
    pub aggregate: Aggregate,

    /// State and version immediately before the commit; `None` for inserts.
    pub previous: Option<(AggregateState, Version)>,
}

/// In-memory store of aggregates keyed by id, with optimistic locking.
///
/// Each aggregate lives behind its own mutex; the outer map lock is only
/// held long enough to resolve the slot (or to insert a new one). Commits
/// on one aggregate are therefore linearized, while commits on different
/// aggregates never contend on a shared lock.
///
/// The store is a cache of current state: it can be rebuilt from the
/// event log alone via [`AggregateStore::restore`].
#[derive(Default)]
pub struct AggregateStore {
    slots: RwLock<HashMap<AggregateId, Arc<Mutex<Aggregate>>>>,
}

impl AggregateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state and version of an aggregate.
    pub async fn get(&self, id: &AggregateId) -> Result<Aggregate> {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let aggregate = slot.lock().await;
        Ok(aggregate.clone())
    }

    /// Returns true if the aggregate exists.
    pub async fn contains(&self, id: &AggregateId) -> bool {
        self.slots.read().await.contains_key(id)
    }

    /// Returns the number of aggregates held.
    pub async fn aggregate_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Atomically mutates one aggregate with an optimistic version check.
    ///
    /// * `expected == None` is insert-only: the mutator runs against an
    ///   empty default state and the aggregate is created at version 1;
    ///   an existing id fails with [`StoreError::AlreadyExists`].
    /// * `expected == Some(v)` requires the live version to equal `v`;
    ///   a stale value fails with [`StoreError::Conflict`] without
    ///   touching the aggregate. On a match the mutator runs and, on
    ///   success, the new state is installed at `v.next()`.
    ///
    /// A [`ValidationError`] from the mutator aborts the commit without a
    /// version bump and is not a conflict. The store makes exactly one
    /// attempt; retry policy belongs to the caller.
    pub async fn commit<F>(
        &self,
        id: &AggregateId,
        expected: Option<Version>,
        mutator: F,
    ) -> Result<Committed>
    where
        F: FnOnce(&AggregateState) -> std::result::Result<AggregateState, ValidationError>,
    {
        match expected {
            None => self.insert(id, mutator).await,
            Some(expected) => self.update(id, expected, mutator).await,
        }
    }

    /// Installs an aggregate at an explicit version, replacing any
    /// existing entry. Used only when rehydrating the store from the
    /// event log.
    pub async fn restore(&self, aggregate: Aggregate) {
        let mut slots = self.slots.write().await;
        slots.insert(aggregate.id.clone(), Arc::new(Mutex::new(aggregate)));
    }

    async fn slot(&self, id: &AggregateId) -> Option<Arc<Mutex<Aggregate>>> {
        self.slots.read().await.get(id).cloned()
    }

    async fn insert<F>(&self, id: &AggregateId, mutator: F) -> Result<Committed>
    where
        F: FnOnce(&AggregateState) -> std::result::Result<AggregateState, ValidationError>,
    {
        let mut slots = self.slots.write().await;
        if slots.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.clone()));
        }

        let state = mutator(&AggregateState::default())?;
        let aggregate = Aggregate::created(id.clone(), state);
        slots.insert(id.clone(), Arc::new(Mutex::new(aggregate.clone())));

        metrics::counter!("store_commits_total").increment(1);
        tracing::debug!(aggregate_id = %id, version = %aggregate.version, "aggregate created");

        Ok(Committed {
            aggregate,
            previous: None,
        })
    }

    async fn update<F>(&self, id: &AggregateId, expected: Version, mutator: F) -> Result<Committed>
    where
        F: FnOnce(&AggregateState) -> std::result::Result<AggregateState, ValidationError>,
    {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        // Per-aggregate serialization point: exactly one commit holds
        // this lock at a time for a given id.
        let mut aggregate = slot.lock().await;

        if aggregate.version != expected {
            metrics::counter!("store_conflicts_total").increment(1);
            return Err(StoreError::Conflict {
                aggregate_id: id.clone(),
                expected,
                actual: aggregate.version,
            });
        }

        let new_state = mutator(&aggregate.state)?;
        let previous = (aggregate.state.clone(), aggregate.version);

        aggregate.state = new_state;
        aggregate.version = aggregate.version.next();
        aggregate.updated_at = Utc::now();

        metrics::counter!("store_commits_total").increment(1);
        tracing::debug!(aggregate_id = %id, version = %aggregate.version, "aggregate committed");

        Ok(Committed {
            aggregate: aggregate.clone(),
            previous: Some(previous),
        })
    }
}
