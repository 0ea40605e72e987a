//! # Core Type Definitions
//!
//! This module contains the identifier types used throughout the Herald
//! relay. These types provide the building blocks for player management,
//! message retraction, and channel routing.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Unique identifier for players across the fleet
//! - [`ServerId`] - Unique identifier for one server process
//! - [`MessageId`] - Unique identifier for a chat message
//! - [`ChannelName`] - Name of a configured broadcast channel
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent ID confusion (PlayerId vs MessageId)
//! - **Serialization**: All types support JSON serialization for packet payloads
//! - **Performance**: Efficient memory layout and fast comparison operations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Core Types (Minimal set)
// ============================================================================

/// Unique identifier for a player in the shared population.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// player IDs cannot be confused with other types of IDs in the system.
/// The same player carries the same id on every server in the fleet.
///
/// # Examples
///
/// ```rust
/// use herald_events::PlayerId;
///
/// // Create a new random player ID
/// let player_id = PlayerId::new();
///
/// // Parse from string
/// let player_id = PlayerId::from_str("550e8400-e29b-41d4-a716-446655440000")?;
///
/// // Convert to string for logging/display
/// println!("Player ID: {}", player_id);
/// # Ok::<(), uuid::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    ///
    /// This method is cryptographically secure and provides sufficient
    /// entropy to avoid collisions in practical use.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a player ID from a string representation.
    ///
    /// # Returns
    ///
    /// Returns `Ok(PlayerId)` if the string is a valid UUID, otherwise returns
    /// `Err(uuid::Error)` with details about the parsing failure.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one server process in the fleet.
///
/// Generated fresh at process start and stamped into every outbound packet
/// envelope. A server recognizes its own broadcasts by comparing the envelope
/// id against its own and discards matches.
///
/// # Examples
///
/// ```rust
/// use herald_events::ServerId;
///
/// let server_id = ServerId::new();
/// println!("Server: {}", server_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub Uuid);

impl ServerId {
    /// Creates a new random server ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat message.
///
/// Assigned when the message is submitted and carried through relay and
/// retraction. Never reused within a process; a delete request names the
/// message to retract by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random message ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a message ID from a string representation.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a configured broadcast channel.
///
/// Channel names are plain strings compared exactly; looking up a name the
/// configuration does not define yields no channel rather than an error.
///
/// # Examples
///
/// ```rust
/// use herald_events::ChannelName;
///
/// let global = ChannelName::new("global");
/// assert_eq!(global.as_str(), "global");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName(pub String);

impl ChannelName {
    /// Creates a channel name from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_types_are_distinct_values() {
        // Two fresh ids never collide in practice.
        assert_ne!(PlayerId::new(), PlayerId::new());
        assert_ne!(ServerId::new(), ServerId::new());
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn test_player_id_parse_round_trip() {
        let id = PlayerId::new();
        let parsed = PlayerId::from_str(&id.to_string()).expect("Failed to parse rendered id");
        assert_eq!(id, parsed);

        assert!(PlayerId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_channel_name_display_matches_inner() {
        let name = ChannelName::new("global");
        assert_eq!(name.to_string(), "global");
        assert_eq!(ChannelName::from("global"), name);
    }
}
