use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::EventKind;
use event_log::Event;

use crate::error::HandlerFailure;
use crate::handler::EventHandler;

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Events of one specific kind.
    Kind(EventKind),

    /// Every event ("all" wildcard).
    All,
}

impl From<EventKind> for Topic {
    fn from(kind: EventKind) -> Self {
        Topic::Kind(kind)
    }
}

/// Handle returned by `subscribe`, usable to remove the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of one dispatch pass.
///
/// Publishing never fails as a whole: handler failures are collected
/// here so the publisher can decide whether to compensate.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// How many handlers were invoked.
    pub delivered: usize,

    /// Handlers that returned an error, in invocation order.
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    /// Returns true if every invoked handler succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
}

/// Synchronous pub-sub dispatcher.
///
/// `publish` runs every matching handler to completion before returning:
/// kind-specific handlers first in subscription order, then wildcard
/// handlers in their own subscription order. Cascades are depth-first —
/// a handler that publishes from inside `handle` awaits that nested
/// dispatch before returning, so a chain of reactions fully resolves
/// before control returns to the original publisher.
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    /// Creates a bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a topic and returns its subscription id.
    ///
    /// Handlers for the same topic are invoked in subscription order.
    pub fn subscribe(&self, topic: impl Into<Topic>, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let mut registry = self.registry.write().expect("bus registry poisoned");
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        let subscription = Subscription { id, handler };

        match topic.into() {
            Topic::Kind(kind) => registry.by_kind.entry(kind).or_default().push(subscription),
            Topic::All => registry.wildcard.push(subscription),
        }
        id
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write().expect("bus registry poisoned");

        for subs in registry.by_kind.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                return true;
            }
        }
        if let Some(pos) = registry.wildcard.iter().position(|s| s.id == id) {
            registry.wildcard.remove(pos);
            return true;
        }
        false
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let registry = self.registry.read().expect("bus registry poisoned");
        registry.by_kind.values().map(Vec::len).sum::<usize>() + registry.wildcard.len()
    }

    /// Delivers an event to all matching handlers.
    ///
    /// All currently-registered handlers run to completion (or fail)
    /// before this returns. Failures are collected into the report, not
    /// raised, so one faulty listener cannot block the chain.
    #[tracing::instrument(skip(self, event), fields(kind = %event.kind, aggregate_id = %event.aggregate_id))]
    pub async fn publish(&self, event: &Event) -> PublishReport {
        // Snapshot under the lock, dispatch outside it: handlers may
        // subscribe or publish re-entrantly.
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let registry = self.registry.read().expect("bus registry poisoned");
            let kind_specific = registry
                .by_kind
                .get(&event.kind)
                .into_iter()
                .flat_map(|subs| subs.iter());
            kind_specific
                .chain(registry.wildcard.iter())
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        let mut report = PublishReport::default();
        for handler in handlers {
            report.delivered += 1;
            if let Err(error) = handler.handle(event).await {
                tracing::warn!(
                    handler = handler.name(),
                    kind = %event.kind,
                    %error,
                    "event handler failed"
                );
                metrics::counter!("bus_handler_failures_total").increment(1);
                report.failures.push(HandlerFailure {
                    handler: handler.name().to_string(),
                    error,
                });
            }
        }

        metrics::counter!("bus_events_published_total").increment(1);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use async_trait::async_trait;
    use common::{AggregateId, Version};
    use event_log::{EventLog, InMemoryEventLog};
    use std::sync::Mutex;

    /// Records invocations into a shared trace for ordering assertions.
    struct TracingHandler {
        label: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for TracingHandler {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
            self.trace
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, event.kind));
            if self.fail {
                Err(HandlerError::new("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn handler(
        label: &'static str,
        trace: &Arc<Mutex<Vec<String>>>,
        fail: bool,
    ) -> Arc<dyn EventHandler> {
        Arc::new(TracingHandler {
            label,
            trace: Arc::clone(trace),
            fail,
        })
    }

    async fn sample_event(kind: EventKind) -> Event {
        let log = InMemoryEventLog::new();
        log.append(
            &AggregateId::new("ORD-1"),
            kind,
            serde_json::json!({}),
            Version::first(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn kind_handlers_run_before_wildcard_in_subscription_order() {
        let bus = EventBus::new();
        let trace = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Topic::All, handler("wild-1", &trace, false));
        bus.subscribe(EventKind::order_created(), handler("kind-1", &trace, false));
        bus.subscribe(EventKind::order_created(), handler("kind-2", &trace, false));
        bus.subscribe(Topic::All, handler("wild-2", &trace, false));

        let event = sample_event(EventKind::order_created()).await;
        let report = bus.publish(&event).await;

        assert_eq!(report.delivered, 4);
        assert!(report.all_succeeded());
        assert_eq!(
            *trace.lock().unwrap(),
            vec![
                "kind-1:ORDER_CREATED",
                "kind-2:ORDER_CREATED",
                "wild-1:ORDER_CREATED",
                "wild-2:ORDER_CREATED",
            ]
        );
    }

    #[tokio::test]
    async fn unmatched_kind_reaches_only_wildcard() {
        let bus = EventBus::new();
        let trace = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::order_created(), handler("kind", &trace, false));
        bus.subscribe(Topic::All, handler("wild", &trace, false));

        let event = sample_event(EventKind::order_shipped()).await;
        let report = bus.publish(&event).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(*trace.lock().unwrap(), vec!["wild:ORDER_SHIPPED"]);
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let trace = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::order_created(), handler("first", &trace, true));
        bus.subscribe(EventKind::order_created(), handler("second", &trace, false));
        bus.subscribe(Topic::All, handler("third", &trace, true));

        let event = sample_event(EventKind::order_created()).await;
        let report = bus.publish(&event).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].handler, "first");
        assert_eq!(report.failures[1].handler, "third");
        assert_eq!(trace.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let trace = Arc::new(Mutex::new(Vec::new()));

        let id = bus.subscribe(EventKind::order_created(), handler("gone", &trace, false));
        bus.subscribe(EventKind::order_created(), handler("stays", &trace, false));

        assert_eq!(bus.subscription_count(), 2);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscription_count(), 1);

        let event = sample_event(EventKind::order_created()).await;
        bus.publish(&event).await;

        assert_eq!(*trace.lock().unwrap(), vec!["stays:ORDER_CREATED"]);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_empty_report() {
        let bus = EventBus::new();
        let event = sample_event(EventKind::order_created()).await;
        let report = bus.publish(&event).await;
        assert_eq!(report.delivered, 0);
        assert!(report.all_succeeded());
    }

    /// A handler that republishes a follow-up event, to pin down the
    /// depth-first cascade order.
    struct CascadingHandler {
        bus: Arc<EventBus>,
        log: InMemoryEventLog,
        trace: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for CascadingHandler {
        fn name(&self) -> &str {
            "cascading"
        }

        async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
            self.trace
                .lock()
                .unwrap()
                .push(format!("cascading:enter:{}", event.kind));
            let follow_up = self
                .log
                .append(
                    &event.aggregate_id,
                    EventKind::new("FOLLOW_UP"),
                    serde_json::json!({}),
                    event.caused_by_version.next(),
                )
                .await
                .map_err(|e| HandlerError::new(e.to_string()))?;
            self.bus.publish(&follow_up).await;
            self.trace
                .lock()
                .unwrap()
                .push(format!("cascading:exit:{}", event.kind));
            Ok(())
        }
    }

    #[tokio::test]
    async fn cascades_resolve_depth_first() {
        let bus = Arc::new(EventBus::new());
        let log = InMemoryEventLog::new();
        let trace = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            EventKind::order_created(),
            Arc::new(CascadingHandler {
                bus: Arc::clone(&bus),
                log: log.clone(),
                trace: Arc::clone(&trace),
            }),
        );
        bus.subscribe(EventKind::new("FOLLOW_UP"), handler("nested", &trace, false));
        bus.subscribe(Topic::All, handler("audit", &trace, false));

        let event = sample_event(EventKind::order_created()).await;
        bus.publish(&event).await;

        // The nested FOLLOW_UP dispatch (including its wildcard pass)
        // finishes before the outer dispatch continues.
        assert_eq!(
            *trace.lock().unwrap(),
            vec![
                "cascading:enter:ORDER_CREATED",
                "nested:FOLLOW_UP",
                "audit:FOLLOW_UP",
                "cascading:exit:ORDER_CREATED",
                "audit:ORDER_CREATED",
            ]
        );
    }
}
