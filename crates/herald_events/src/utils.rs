//! # Utility Functions
//!
//! Convenience helpers shared across the Herald event system: consistent
//! timestamp generation and the event bus factory function.

use crate::dispatch::EventBus;
use std::sync::Arc;

// ============================================================================
// Utility Functions
// ============================================================================

/// Returns the current Unix timestamp in seconds.
///
/// This function provides a consistent way to get timestamps across the
/// entire system.
///
/// # Panics
///
/// Panics if the system clock is set to a time before the Unix epoch
/// (January 1, 1970). This should never happen in practice on modern systems.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Returns the current Unix timestamp in milliseconds.
///
/// Event and packet timestamps use millisecond precision so messages sent in
/// the same second still order usefully in logs.
///
/// # Panics
///
/// Panics under the same clock conditions as [`current_timestamp`].
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// Creates a new event bus instance.
///
/// This is the primary factory function for creating event bus instances.
/// It returns an `Arc<EventBus>` that can be safely shared across multiple
/// threads and stored in various contexts.
///
/// # Examples
///
/// ```rust
/// use herald_events::*;
///
/// let events = create_event_bus();
///
/// events.subscribe(|event: &PlayerJoinedEvent| {
///     println!("{} is here", event.username);
///     Ok(())
/// });
/// ```
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::new())
}
