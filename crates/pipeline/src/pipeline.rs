//! Command execution against the store, log, and bus.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use aggregate_store::{AggregateState, AggregateStore, StoreError};
use common::{AggregateId, EventKind, Version};
use event_bus::EventBus;
use event_log::EventLog;

use crate::command::{Command, CommandReceipt, CommandState};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// One entry of an aggregate's undo history: the payload and version it
/// held before a commit.
#[derive(Debug, Clone)]
struct UndoFrame {
    state: AggregateState,
    version: Version,
}

/// Executes commands with optimistic-conflict retry, records committed
/// events in the log, and publishes them on the bus.
///
/// Commit order is append-then-publish: an event is durable in the log
/// before any subscriber sees it.
pub struct CommandPipeline {
    store: Arc<AggregateStore>,
    log: Arc<dyn EventLog>,
    bus: Arc<EventBus>,
    config: PipelineConfig,
    undo_stacks: Mutex<HashMap<AggregateId, VecDeque<UndoFrame>>>,
}

impl CommandPipeline {
    /// Creates a pipeline over the given store, log, and bus.
    pub fn new(
        store: Arc<AggregateStore>,
        log: Arc<dyn EventLog>,
        bus: Arc<EventBus>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            log,
            bus,
            config,
            undo_stacks: Mutex::new(HashMap::new()),
        }
    }

    /// Executes one command to completion.
    ///
    /// Domain rejections on a fresh version are terminal
    /// ([`PipelineError::Validation`], never retried). A stale
    /// `expected_version` is retried with the refreshed version and
    /// exponential backoff, up to `max_retries`; a command that exhausts
    /// its retries — or that no longer validates against the refreshed
    /// state — surfaces [`PipelineError::Conflict`], since the stale view
    /// is the root cause either way.
    #[tracing::instrument(skip(self, command), fields(aggregate_id = %command.aggregate_id(), kind = %command.kind()))]
    pub async fn submit(&self, command: &dyn Command) -> Result<CommandReceipt> {
        let id = command.aggregate_id().clone();
        let original_expected = command.expected_version();
        let mut expected = original_expected;
        let mut attempts: u32 = 0;
        let mut last_actual = Version::initial();

        let committed = loop {
            attempts += 1;
            tracing::debug!(state = %CommandState::Validating, attempt = attempts, "executing command");

            match self
                .store
                .commit(&id, expected, |state| command.apply(state))
                .await
            {
                Ok(committed) => break committed,
                Err(StoreError::Conflict {
                    expected: stale,
                    actual,
                    ..
                }) => {
                    metrics::counter!("pipeline_conflicts_total").increment(1);
                    last_actual = actual;
                    if attempts > self.config.max_retries {
                        tracing::warn!(state = %CommandState::Conflicted, attempts, "command gave up");
                        return Err(PipelineError::Conflict {
                            aggregate_id: id,
                            expected: stale,
                            actual,
                            attempts,
                        });
                    }
                    tokio::time::sleep(self.config.backoff_for(attempts)).await;
                    expected = Some(actual);
                }
                Err(StoreError::Rejected(validation)) => {
                    if attempts == 1 {
                        tracing::debug!(state = %CommandState::Rejected, reason = %validation, "command rejected");
                        metrics::counter!("pipeline_rejections_total").increment(1);
                        return Err(PipelineError::Validation(validation));
                    }
                    // The command validated when it was issued but no
                    // longer does against the refreshed state: the stale
                    // view is the root cause.
                    tracing::warn!(state = %CommandState::Conflicted, attempts, "command stale after refresh");
                    return Err(PipelineError::Conflict {
                        aggregate_id: id,
                        expected: original_expected.unwrap_or(last_actual),
                        actual: last_actual,
                        attempts,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        };

        if let Some((state, version)) = committed.previous.clone() {
            self.push_undo_frame(&id, UndoFrame { state, version }).await;
        }

        let aggregate = committed.aggregate;

        // Durability before visibility: the event reaches the log before
        // any subscriber runs.
        let event = self
            .log
            .append(
                &id,
                command.kind(),
                serde_json::to_value(&aggregate.state)?,
                aggregate.version,
            )
            .await?;
        let publish = self.bus.publish(&event).await;

        metrics::counter!("pipeline_commits_total").increment(1);
        tracing::debug!(
            state = %CommandState::Committed,
            version = %aggregate.version,
            sequence = %event.sequence,
            handler_failures = publish.failures.len(),
            "command committed"
        );

        Ok(CommandReceipt {
            aggregate,
            event,
            publish,
            attempts,
        })
    }

    /// Restores the aggregate's most recent prior payload.
    ///
    /// Undo is itself a forward-moving command: it commits the retained
    /// payload as a new mutation (version increments, a `STATE_RESTORED`
    /// event is appended), never a rollback of the log. The restore
    /// commit pushes its own undo frame, so undoing an undo redoes.
    #[tracing::instrument(skip(self))]
    pub async fn undo(&self, id: &AggregateId) -> Result<CommandReceipt> {
        let frame = self
            .pop_undo_frame(id)
            .await
            .ok_or_else(|| PipelineError::NothingToUndo(id.clone()))?;

        let current = match self.store.get(id).await {
            Ok(aggregate) => aggregate,
            Err(e) => {
                self.push_undo_frame(id, frame).await;
                return Err(e.into());
            }
        };

        let restore = RestoreState {
            aggregate_id: id.clone(),
            expected: current.version,
            prior: frame.state.clone(),
        };

        match self.submit(&restore).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                // The frame was not consumed; keep it available.
                self.push_undo_frame(id, frame).await;
                Err(e)
            }
        }
    }

    /// Returns how many undo frames are retained for an aggregate.
    pub async fn undo_depth(&self, id: &AggregateId) -> usize {
        let stacks = self.undo_stacks.lock().await;
        stacks.get(id).map(VecDeque::len).unwrap_or(0)
    }

    async fn push_undo_frame(&self, id: &AggregateId, frame: UndoFrame) {
        let mut stacks = self.undo_stacks.lock().await;
        let stack = stacks.entry(id.clone()).or_default();
        if stack.len() == self.config.undo_depth {
            stack.pop_front();
        }
        stack.push_back(frame);
    }

    async fn pop_undo_frame(&self, id: &AggregateId) -> Option<UndoFrame> {
        let mut stacks = self.undo_stacks.lock().await;
        stacks.get_mut(id).and_then(VecDeque::pop_back)
    }
}

/// Internal command that re-commits a retained prior payload.
struct RestoreState {
    aggregate_id: AggregateId,
    expected: Version,
    prior: AggregateState,
}

impl Command for RestoreState {
    fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected)
    }

    fn kind(&self) -> EventKind {
        EventKind::state_restored()
    }

    fn apply(&self, _state: &AggregateState) -> std::result::Result<AggregateState, aggregate_store::ValidationError> {
        Ok(self.prior.clone())
    }
}
