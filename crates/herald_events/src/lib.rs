//! # Herald Event System
//!
//! Type-safe event dispatch for the Herald cross-server chat relay. Every
//! in-process signal the relay cares about - a chat message sent, a message
//! retracted, a nickname change, a mute - is a plain typed event delivered
//! synchronously to whoever subscribed for that exact payload type.
//!
//! ## Core Features
//!
//! - **Type Safety**: Subscriptions are keyed by the concrete payload type,
//!   checked at compile time
//! - **Synchronous Delivery**: Handlers run on the publishing context, in
//!   registration order, before `publish` returns
//! - **Failure Isolation**: A failing handler is logged and skipped; the
//!   remaining handlers still run
//! - **Wire-Ready Payloads**: Every event type serializes to JSON, so the
//!   messaging layer can put the same payloads on a packet bus
//! - **Statistics**: Subscription and publish counters for monitoring
//!
//! ## Quick Start Example
//!
//! ```rust
//! use herald_events::*;
//!
//! fn main() {
//!     let events = create_event_bus();
//!
//!     let sub = events.subscribe(|event: &ChatMessageEvent| {
//!         println!("[{}] {}: {}", event.channel, event.sender_name, event.content);
//!         Ok(())
//!     });
//!
//!     events.publish(&ChatMessageEvent::local(
//!         MessageId::new(),
//!         PlayerId::new(),
//!         "steve".to_string(),
//!         ChannelName::new("global"),
//!         "hello from this server".to_string(),
//!     ));
//!
//!     // Subscriptions are removed explicitly; dropping the id does nothing.
//!     events.unsubscribe(sub);
//! }
//! ```
//!
//! ## Local vs. Remote Events
//!
//! Events that travel between servers carry an [`EventOrigin`]. Handlers that
//! relay traffic onto the packet bus must only act on `EventOrigin::Local`
//! instances; inbound packets are republished as `EventOrigin::Remote` so the
//! relay never forwards an event it received from another server.

use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;

pub mod dispatch;
pub mod domain;
pub mod types;
pub mod utils;

pub use dispatch::{EventBus, EventBusStats, SubscriptionId};
pub use domain::{
    ChannelMembershipChangedEvent, ChatMessageEvent, EventOrigin, MessageDeletedEvent,
    MuteStateChangedEvent, NicknameChangedEvent, PlayerJoinedEvent,
};
pub use types::{ChannelName, MessageId, PlayerId, ServerId};
pub use utils::{create_event_bus, current_timestamp, current_timestamp_millis};

// ============================================================================
// Event Traits and Core Infrastructure
// ============================================================================

/// Core trait that all events must implement.
///
/// This trait provides the fundamental capabilities needed for type-safe event
/// handling:
/// - Serialization for network transmission
/// - Type identification for routing
/// - Dynamic typing support for generic handlers
///
/// Most types will automatically implement this trait through the blanket
/// implementation if they implement the required marker traits.
///
/// # Safety
///
/// Events must be Send + Sync as they may be published from any thread.
/// The Debug requirement ensures events can be logged when a handler fails.
pub trait Event: Send + Sync + Any + std::fmt::Debug {
    /// Returns the type name of this event for debugging and routing.
    ///
    /// This should return a stable, unique identifier for the event type.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Serializes the event to bytes for network transmission or storage.
    fn serialize(&self) -> Result<Vec<u8>, EventError>;

    /// Deserializes an event from bytes.
    ///
    /// Returns `Ok(Self)` with the deserialized event, or `Err(EventError)`
    /// if the bytes do not describe a valid instance.
    fn deserialize(data: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;

    /// Returns a reference to this event as `&dyn Any` for dynamic typing.
    ///
    /// This enables runtime type checking and downcasting when needed.
    fn as_any(&self) -> &dyn Any;
}

/// Blanket implementation of Event trait for types that meet the requirements.
///
/// Any type that implements Serialize + DeserializeOwned + Send + Sync + Any +
/// Debug automatically gets an Event implementation with JSON serialization.
///
/// This makes it very easy to create new event types - just derive the
/// required traits:
///
/// ```rust
/// # use serde::{Deserialize, Serialize};
/// #[derive(Debug, Serialize, Deserialize)]
/// struct MyEvent {
///     data: String,
/// }
/// // MyEvent now implements Event automatically!
/// ```
impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Any + std::fmt::Debug + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn serialize(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(EventError::Serialization)
    }

    fn deserialize(data: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(data).map_err(EventError::Deserialization)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler trait for processing events behind a uniform interface.
///
/// This trait abstracts over the type-specific event handling logic so the
/// bus can hold handlers for arbitrary payload types in one registry.
///
/// Most users will not implement this trait directly, but instead pass a
/// closure to [`EventBus::subscribe`], which wraps it in a
/// [`TypedEventHandler`].
pub trait EventHandler: Send + Sync {
    /// Handles an event provided as `&dyn Any`.
    ///
    /// Implementations downcast to their concrete payload type. A payload of
    /// the wrong type is a routing bug and is reported as
    /// `EventError::HandlerExecution`.
    fn handle(&self, event: &dyn Any) -> Result<(), EventError>;

    /// Returns the `TypeId` of the event type this handler expects.
    fn expected_type_id(&self) -> std::any::TypeId;

    /// Returns a human-readable name for this handler for debugging.
    fn handler_name(&self) -> &str;
}

/// Type-safe wrapper for event handlers.
///
/// This struct bridges between the generic [`EventHandler`] trait and specific
/// event types, providing compile-time type safety while allowing runtime
/// polymorphism.
///
/// # Type Parameters
///
/// * `T` - The event type this handler processes
/// * `F` - The function type that handles the event
pub struct TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(&T) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T, F> TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(&T) -> Result<(), EventError> + Send + Sync,
{
    /// Creates a new typed event handler.
    ///
    /// # Arguments
    ///
    /// * `name` - Human-readable name for debugging
    /// * `handler` - Function to handle events of type T
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler for TypedEventHandler<T, F>
where
    T: Event + 'static,
    F: Fn(&T) -> Result<(), EventError> + Send + Sync,
{
    fn handle(&self, event: &dyn Any) -> Result<(), EventError> {
        let event = event.downcast_ref::<T>().ok_or_else(|| {
            EventError::HandlerExecution(format!(
                "handler {} received a payload that is not {}",
                self.name,
                T::type_name()
            ))
        })?;
        (self.handler)(event)
    }

    fn expected_type_id(&self) -> std::any::TypeId {
        std::any::TypeId::of::<T>()
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during event system operations.
///
/// This enum covers all possible error conditions in the event system,
/// from serialization failures to handler execution errors.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Serialization failed when converting event to bytes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Deserialization failed when converting bytes to event
    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),
    /// Handler execution failed during event processing
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
}

// ============================================================================
// Test Suite
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestEvent {
        message: String,
    }

    #[test]
    fn test_blanket_event_impl() {
        let event = TestEvent {
            message: "wire me".to_string(),
        };

        let bytes = Event::serialize(&event).expect("Failed to serialize test event");
        let back = <TestEvent as Event>::deserialize(&bytes)
            .expect("Failed to deserialize test event bytes");
        assert_eq!(event, back);

        assert!(TestEvent::type_name().contains("TestEvent"));
        assert!(event.as_any().downcast_ref::<TestEvent>().is_some());
    }

    #[test]
    fn test_typed_handler_rejects_wrong_payload() {
        let handler = TypedEventHandler::new("test_handler".to_string(), |_: &TestEvent| Ok(()));

        // A payload of a different type is a routing bug, not a silent skip.
        let wrong: &dyn Any = &42u32;
        let result = handler.handle(wrong);
        assert!(matches!(result, Err(EventError::HandlerExecution(_))));

        let right = TestEvent {
            message: "ok".to_string(),
        };
        assert!(handler.handle(right.as_any()).is_ok());
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        let result = <TestEvent as Event>::deserialize(b"not json at all");
        assert!(matches!(result, Err(EventError::Deserialization(_))));
    }
}
