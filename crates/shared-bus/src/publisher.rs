//! # Event Publisher
//!
//! Defines the publishing side of the event bus and the in-memory bus
//! itself.

use crate::events::{EventKey, EventKind, MembershipEvent};
use crate::subscriber::{EventStream, Subscription};
use parking_lot::RwLock;
use shared_types::DiscoveryKey;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// A subscriber callback.
pub type EventHandler = Arc<dyn Fn(&MembershipEvent) + Send + Sync>;

/// Trait for publishing events to the bus.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to every handler subscribed to its key.
    ///
    /// # Returns
    ///
    /// The number of handlers that ran to completion.
    fn publish(&self, event: MembershipEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Handlers registered per key, in subscription order.
#[derive(Default)]
pub(crate) struct HandlerTable {
    next_id: u64,
    handlers: HashMap<EventKey, Vec<(u64, EventHandler)>>,
}

impl HandlerTable {
    fn insert(&mut self, key: EventKey, handler: EventHandler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.entry(key).or_default().push((id, handler));
        id
    }

    pub(crate) fn remove(&mut self, key: &EventKey, id: u64) -> bool {
        let Some(list) = self.handlers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(key);
        }
        removed
    }

    fn handlers_for(&self, key: &EventKey) -> Vec<EventHandler> {
        self.handlers
            .get(key)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn count(&self, key: &EventKey) -> usize {
        self.handlers.get(key).map_or(0, Vec::len)
    }

    fn total(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

/// In-memory implementation of the event bus.
///
/// The handler list for a key is copied out of the table before any handler
/// runs, so handlers may subscribe or unsubscribe while being called. Those
/// changes apply from the next `publish`.
pub struct InMemoryEventBus {
    /// Registered handlers.
    table: Arc<RwLock<HandlerTable>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Handler invocations that panicked.
    handler_failures: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(HandlerTable::default())),
            events_published: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    /// Register `handler` for events of `kind` on `resource`.
    ///
    /// The handler stays registered until the returned `Subscription` is
    /// dropped (or forever, after `Subscription::detach`).
    pub fn subscribe<F>(&self, kind: EventKind, resource: DiscoveryKey, handler: F) -> Subscription
    where
        F: Fn(&MembershipEvent) + Send + Sync + 'static,
    {
        let key = EventKey::new(kind, resource);
        let id = self.table.write().insert(key, Arc::new(handler));

        debug!(key = %key, "New subscription created");

        Subscription::new(Arc::downgrade(&self.table), key, id)
    }

    /// Forward events of `kind` on `resource` into an async stream.
    #[must_use]
    pub fn event_stream(&self, kind: EventKind, resource: DiscoveryKey) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.subscribe(kind, resource, move |event| {
            // Receiver gone means the stream was dropped; its subscription
            // goes with it.
            let _ = sender.send(event.clone());
        });
        EventStream::new(subscription, receiver)
    }

    /// Number of handlers registered for `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &EventKey) -> usize {
        self.table.read().count(key)
    }

    /// Number of handlers registered across all keys.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.table.read().total()
    }

    /// Number of handler invocations that panicked.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: MembershipEvent) -> usize {
        let key = event.key();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let handlers = self.table.read().handlers_for(&key);
        if handlers.is_empty() {
            debug!(key = %key, "Event dropped (no subscribers)");
            return 0;
        }

        let mut delivered = 0;
        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        key = %key,
                        connection = %event.connection_id,
                        panic = panic_message(payload.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        debug!(
            key = %key,
            connection = %event.connection_id,
            receivers = delivered,
            "Event published"
        );
        delivered
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared_types::{ConnectionId, IdentityClaim, RosterSnapshot};

    fn resource(byte: u8) -> DiscoveryKey {
        DiscoveryKey::new([byte; 32])
    }

    fn join_event(resource: DiscoveryKey, conn: &str) -> MembershipEvent {
        MembershipEvent::join(
            resource,
            ConnectionId::from(conn),
            IdentityClaim::new("abc123"),
            RosterSnapshot::new(),
        )
    }

    #[test]
    fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish(join_event(resource(1), "conn1"));
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[test]
    fn test_publish_reaches_exact_key_only() {
        let bus = InMemoryEventBus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let h = Arc::clone(&hits);
        let _join = bus.subscribe(EventKind::Join, resource(1), move |_| h.lock().push("join-1"));
        let h = Arc::clone(&hits);
        let _leave = bus.subscribe(EventKind::Leave, resource(1), move |_| h.lock().push("leave-1"));
        let h = Arc::clone(&hits);
        let _other = bus.subscribe(EventKind::Join, resource(2), move |_| h.lock().push("join-2"));

        assert_eq!(bus.publish(join_event(resource(1), "conn1")), 1);
        assert_eq!(*hits.lock(), vec!["join-1"]);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = InMemoryEventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|i| {
                let o = Arc::clone(&order);
                bus.subscribe(EventKind::Join, resource(1), move |_| o.lock().push(i))
            })
            .collect();

        assert_eq!(bus.publish(join_event(resource(1), "conn1")), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = InMemoryEventBus::new();
        let reached = Arc::new(Mutex::new(false));

        let _bad = bus.subscribe(EventKind::Join, resource(1), |_| panic!("listener bug"));
        let r = Arc::clone(&reached);
        let _good = bus.subscribe(EventKind::Join, resource(1), move |_| *r.lock() = true);

        assert_eq!(bus.publish(join_event(resource(1), "conn1")), 1);
        assert!(*reached.lock());
        assert_eq!(bus.handler_failures(), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = Arc::new(InMemoryEventBus::new());
        let late = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = Arc::clone(&bus);
        let inner_late = Arc::clone(&late);
        let _outer = bus.subscribe(EventKind::Join, resource(1), move |_| {
            inner_late
                .lock()
                .push(inner_bus.subscribe(EventKind::Join, resource(1), |_| {}));
        });

        // The handler added mid-publish is not called for the current event.
        assert_eq!(bus.publish(join_event(resource(1), "conn1")), 1);
        assert_eq!(bus.subscriber_count(&EventKey::join(resource(1))), 2);
    }

    #[test]
    fn test_total_subscribers() {
        let bus = InMemoryEventBus::new();
        let _a = bus.subscribe(EventKind::Join, resource(1), |_| {});
        let _b = bus.subscribe(EventKind::Leave, resource(2), |_| {});
        assert_eq!(bus.total_subscribers(), 2);
        assert_eq!(bus.subscriber_count(&EventKey::leave(resource(2))), 1);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.total_subscribers(), 0);
        assert_eq!(bus.events_published(), 0);
        assert_eq!(bus.handler_failures(), 0);
    }
}
