//! # Event Bus
//!
//! The in-process dispatcher behind the relay. Subscriptions are keyed by the
//! concrete payload type; publishing walks the subscribers for exactly that
//! type, synchronously, in the order they registered.
//!
//! ## Delivery Contract
//!
//! - Handlers run on the publishing thread, before `publish` returns
//! - Handlers for one type run in registration order
//! - A failing handler is logged and skipped; later handlers still run
//! - Events are not persisted: subscribers registered after a publish never
//!   see it
//!
//! ## Thread Safety
//!
//! The bus is fully thread-safe and is shared as `Arc<EventBus>`. The handler
//! registry lives in a [`DashMap`] keyed by `TypeId`; publishing snapshots the
//! handler list for the type before invoking anything, so a publish racing a
//! subscribe or unsubscribe sees a consistent list and never delivers an
//! event twice.

use crate::{Event, EventError, EventHandler, TypedEventHandler};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

// ============================================================================
// Subscription Identity
// ============================================================================

/// Opaque handle for one registered handler.
///
/// Returned by [`EventBus::subscribe`] and consumed by
/// [`EventBus::unsubscribe`]. Subscriptions never expire on their own;
/// dropping the handle leaves the handler registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    seq: u64,
}

/// One registered handler plus the sequence number that identifies it.
struct HandlerEntry {
    seq: u64,
    handler: Arc<dyn EventHandler>,
}

// ============================================================================
// Event Bus
// ============================================================================

/// The dispatcher that routes published events to typed subscribers.
///
/// # Examples
///
/// ```rust
/// use herald_events::*;
///
/// let events = create_event_bus();
///
/// let sub = events.subscribe(|event: &ChatMessageEvent| {
///     println!("{} said: {}", event.sender_name, event.content);
///     Ok(())
/// });
///
/// events.publish(&ChatMessageEvent::local(
///     MessageId::new(),
///     PlayerId::new(),
///     "alex".to_string(),
///     ChannelName::new("global"),
///     "hello".to_string(),
/// ));
///
/// events.unsubscribe(sub);
/// ```
pub struct EventBus {
    /// Registered handlers per payload type, in registration order
    handlers: DashMap<TypeId, Vec<HandlerEntry>>,
    /// Source for subscription sequence numbers
    next_seq: AtomicU64,
    /// Number of live subscriptions
    total_subscriptions: AtomicUsize,
    /// Number of publishes that reached at least one handler
    events_published: AtomicU64,
}

impl EventBus {
    /// Creates a new event bus with no registered handlers.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            next_seq: AtomicU64::new(1),
            total_subscriptions: AtomicUsize::new(0),
            events_published: AtomicU64::new(0),
        }
    }

    /// Registers a handler for every future publish of `T`.
    ///
    /// Handlers registered for the same type run in registration order. The
    /// returned [`SubscriptionId`] is the only way to remove the handler
    /// again.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use herald_events::*;
    /// # let events = create_event_bus();
    /// let sub = events.subscribe(|event: &MessageDeletedEvent| {
    ///     println!("redact {}", event.message_id);
    ///     Ok(())
    /// });
    /// ```
    pub fn subscribe<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: Event + 'static,
        F: Fn(&T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let handler_name = format!("{}#{}", T::type_name(), seq);
        let typed_handler = TypedEventHandler::new(handler_name.clone(), handler);
        let handler_arc: Arc<dyn EventHandler> = Arc::new(typed_handler);

        self.handlers
            .entry(TypeId::of::<T>())
            .or_insert_with(Vec::new)
            .push(HandlerEntry {
                seq,
                handler: handler_arc,
            });

        self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
        info!("📝 Registered handler {}", handler_name);

        SubscriptionId {
            type_id: TypeId::of::<T>(),
            seq,
        }
    }

    /// Delivers `event` to every handler currently subscribed for `T`.
    ///
    /// Delivery is synchronous and runs on the calling thread; when this
    /// returns, every subscriber has run. Handler failures are logged with
    /// the handler name and do not stop delivery to the remaining handlers.
    pub fn publish<T>(&self, event: &T)
    where
        T: Event,
    {
        // Snapshot the handler list and release the shard before invoking:
        // a handler may subscribe or unsubscribe from inside its callback.
        let snapshot: Vec<Arc<dyn EventHandler>> = match self.handlers.get(&TypeId::of::<T>()) {
            Some(entries) => entries.iter().map(|e| e.handler.clone()).collect(),
            None => Vec::new(),
        };

        if snapshot.is_empty() {
            trace!("No subscribers for {}", T::type_name());
            return;
        }

        debug!("📤 Publishing {} to {} handlers", T::type_name(), snapshot.len());

        for handler in &snapshot {
            if let Err(e) = handler.handle(event.as_any()) {
                error!("❌ Handler {} failed on {:?}: {}", handler.handler_name(), event, e);
            }
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes a previously registered handler.
    ///
    /// Unsubscribing an id that was already removed is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(mut entries) = self.handlers.get_mut(&id.type_id) {
            let before = entries.len();
            entries.retain(|entry| entry.seq != id.seq);
            if entries.len() < before {
                self.total_subscriptions.fetch_sub(1, Ordering::Relaxed);
                debug!("Removed subscription #{}", id.seq);
            }
        }
    }

    /// Number of handlers currently subscribed for `T`.
    pub fn handler_count<T: Event + 'static>(&self) -> usize {
        self.handlers
            .get(&TypeId::of::<T>())
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Returns current bus statistics.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use herald_events::*;
    /// # let events = create_event_bus();
    /// let stats = events.stats();
    /// println!(
    ///     "Subscriptions: {}, events: {}",
    ///     stats.total_subscriptions, stats.events_published
    /// );
    /// ```
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics about the bus's usage.
///
/// Useful for monitoring system health and understanding event flow.
#[derive(Debug, Default, Clone)]
pub struct EventBusStats {
    /// Number of live subscriptions across all payload types
    pub total_subscriptions: usize,
    /// Number of publishes that reached at least one handler
    pub events_published: u64,
}

// ============================================================================
// Test Suite
// ============================================================================
