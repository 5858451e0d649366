//! Per-engine listener registry.
//!
//! Every engine owns one [`EventListeners`]. Handlers are registered with a
//! filter and invoked synchronously on the thread that emits the event;
//! async sinks can take a broadcast receiver instead.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::event::{EngineEvent, EventFilter};
use super::listener::EngineListener;

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

type EventHandler = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Registry of event handlers owned by a single engine
pub struct EventListeners {
    /// Broadcast channel sender for async receivers
    sender: broadcast::Sender<EngineEvent>,
    /// Registered synchronous handlers
    handlers: RwLock<HashMap<SubscriptionId, (EventFilter, EventHandler)>>,
}

impl EventListeners {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty registry with a custom broadcast capacity
    pub fn with_capacity(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe with a handler closure
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Arc::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Subscribe an [`EngineListener`] to all events
    pub fn add_listener(&self, listener: Arc<dyn EngineListener>) -> SubscriptionId {
        self.subscribe(EventFilter::All, move |event| match event {
            EngineEvent::Opened => listener.on_opened(),
            EngineEvent::Closed => listener.on_closed(),
            EngineEvent::Failed => listener.on_failed(),
            EngineEvent::LineReceived(line) => listener.on_line_received(line),
        })
    }

    /// Unsubscribe a handler
    ///
    /// Returns true if the subscription was found and removed. Events still
    /// being dispatched when this returns are not delivered to the handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get a receiver for async consumption
    pub fn receiver(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Get the number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver an event to every matching handler and to async receivers
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let snapshot: Vec<(SubscriptionId, EventHandler)> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, (filter, _))| filter.matches(&event))
            .map(|(id, (_, handler))| (*id, Arc::clone(handler)))
            .collect();

        if event.is_lifecycle() {
            tracing::debug!("Dispatching {} to {} handlers", event, snapshot.len());
        }

        let mut delivered = 0;
        for (id, handler) in snapshot {
            // dropped if unsubscribed by an earlier handler
            if !self.handlers.read().contains_key(&id) {
                continue;
            }
            handler(&event);
            delivered += 1;
        }

        // no async receivers is not an error
        let _ = self.sender.send(event);
        delivered
    }
}

impl Default for EventListeners {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
