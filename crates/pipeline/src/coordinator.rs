//! The worker-facing coordination surface.

use std::sync::Arc;

use aggregate_store::{Aggregate, AggregateStore};
use common::AggregateId;
use event_bus::{EventBus, EventHandler, SubscriptionId, Topic};
use event_log::EventLog;

use crate::command::{Command, CommandReceipt};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::CommandPipeline;
use crate::rebuild;

/// The only surface through which worker adapters touch shared state:
/// read an aggregate, issue a command, subscribe to events, undo.
///
/// The coordinator owns the store, log, bus, and pipeline; workers hold
/// it behind an `Arc` and remain free-standing. The core never inspects
/// worker internals, only the commands and subscriptions they hand over.
pub struct Coordinator {
    store: Arc<AggregateStore>,
    log: Arc<dyn EventLog>,
    bus: Arc<EventBus>,
    pipeline: CommandPipeline,
}

impl Coordinator {
    /// Creates a coordinator over an empty store with default config.
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::with_config(log, PipelineConfig::default())
    }

    /// Creates a coordinator over an empty store.
    pub fn with_config(log: Arc<dyn EventLog>, config: PipelineConfig) -> Self {
        Self::assemble(Arc::new(AggregateStore::new()), log, config)
    }

    /// Creates a coordinator whose store is rebuilt from the log
    /// (event-sourcing fallback after a restart).
    pub async fn rehydrate(log: Arc<dyn EventLog>, config: PipelineConfig) -> Result<Self> {
        let store = rebuild::rebuild_store(log.as_ref()).await?;
        Ok(Self::assemble(Arc::new(store), log, config))
    }

    fn assemble(store: Arc<AggregateStore>, log: Arc<dyn EventLog>, config: PipelineConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let pipeline = CommandPipeline::new(
            Arc::clone(&store),
            Arc::clone(&log),
            Arc::clone(&bus),
            config,
        );
        Self {
            store,
            log,
            bus,
            pipeline,
        }
    }

    /// Reads the current state and version of an aggregate.
    pub async fn get(&self, id: &AggregateId) -> Result<Aggregate> {
        Ok(self.store.get(id).await?)
    }

    /// Executes a command through the pipeline.
    pub async fn submit(&self, command: &dyn Command) -> Result<CommandReceipt> {
        self.pipeline.submit(command).await
    }

    /// Registers an event handler.
    pub fn subscribe(&self, topic: impl Into<Topic>, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.bus.subscribe(topic, handler)
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Restores the aggregate's most recent prior payload as a new
    /// forward-moving commit.
    pub async fn undo(&self, id: &AggregateId) -> Result<CommandReceipt> {
        self.pipeline.undo(id).await
    }

    /// The underlying aggregate store.
    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    /// The underlying event log.
    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// The underlying event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
