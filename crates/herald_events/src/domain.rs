//! # Relay Domain Events
//!
//! The event payloads the Herald relay publishes and subscribes to. Gameplay
//! code publishes the `Local` flavor of these; the messaging layer republishes
//! inbound packets as `Remote` so every subscriber sees one consistent stream
//! regardless of which server originated the traffic.

use crate::types::{ChannelName, MessageId, PlayerId, ServerId};
use crate::utils::current_timestamp_millis;
use serde::{Deserialize, Serialize};

// ============================================================================
// Event Origin
// ============================================================================

/// Where an event instance originated.
///
/// Handlers that forward traffic onto the packet bus must only act on
/// `Local` instances. Inbound packets are republished as `Remote`, which is
/// what keeps a broadcast from bouncing between servers forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOrigin {
    /// Produced by this process (a player here sent the message, a moderator
    /// here issued the deletion).
    Local,
    /// Republished from a packet received from another server.
    Remote(ServerId),
}

impl EventOrigin {
    /// True for events produced by this process.
    pub fn is_local(&self) -> bool {
        matches!(self, EventOrigin::Local)
    }
}

// ============================================================================
// Chat Events
// ============================================================================

/// Event published for every chat message accepted into a channel.
///
/// Published with `Local` origin when a player on this server speaks, and
/// with `Remote` origin when the message arrived over the packet bus.
/// Renderers and loggers subscribe to this; the messaging layer subscribes
/// too and relays the `Local` ones to the rest of the fleet.
///
/// # Examples
///
/// ```rust
/// use herald_events::*;
///
/// let events = create_event_bus();
/// events.publish(&ChatMessageEvent::local(
///     MessageId::new(),
///     PlayerId::new(),
///     "alex".to_string(),
///     ChannelName::new("global"),
///     "anyone near the spawn market?".to_string(),
/// ));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    /// Unique id for this message, shared by every server that relays it
    pub message_id: MessageId,
    /// ID of the player who sent the message
    pub sender: PlayerId,
    /// Display name of the sender, carried so remote servers can render
    /// without a profile lookup
    pub sender_name: String,
    /// Channel the message was sent to
    pub channel: ChannelName,
    /// The chat text as typed
    pub content: String,
    /// Which server this instance originated on
    pub origin: EventOrigin,
    /// Unix timestamp in milliseconds when the message was submitted
    pub timestamp: u64,
}

impl ChatMessageEvent {
    /// Builds a locally-originated chat event stamped with the current time.
    pub fn local(
        message_id: MessageId,
        sender: PlayerId,
        sender_name: String,
        channel: ChannelName,
        content: String,
    ) -> Self {
        Self {
            message_id,
            sender,
            sender_name,
            channel,
            content,
            origin: EventOrigin::Local,
            timestamp: current_timestamp_millis(),
        }
    }
}

/// Event published when a message is retracted, locally or fleet-wide.
///
/// Presentation layers subscribe to this and remove or redact the rendered
/// message. Deleting a message nobody remembers is a silent no-op, so
/// subscribers must tolerate ids they never saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletedEvent {
    /// Id of the retracted message
    pub message_id: MessageId,
    /// Which server this deletion originated on
    pub origin: EventOrigin,
    /// Unix timestamp in milliseconds when the deletion was processed here
    pub timestamp: u64,
}

impl MessageDeletedEvent {
    /// Builds a locally-originated deletion event stamped with the current time.
    pub fn local(message_id: MessageId) -> Self {
        Self {
            message_id,
            origin: EventOrigin::Local,
            timestamp: current_timestamp_millis(),
        }
    }
}

// ============================================================================
// Profile Events
// ============================================================================

/// Event published when a player's nickname changes.
///
/// Part of the profile state synced across the fleet; the messaging layer
/// relays `Local` instances as profile-sync packets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicknameChangedEvent {
    /// ID of the player whose nickname changed
    pub player_id: PlayerId,
    /// Nickname before the change, if any
    pub previous: Option<String>,
    /// New nickname, or `None` when it was cleared
    pub nickname: Option<String>,
    /// Which server this change originated on
    pub origin: EventOrigin,
    /// Unix timestamp in milliseconds when the change was applied
    pub timestamp: u64,
}

impl NicknameChangedEvent {
    /// Builds a locally-originated nickname change stamped with the current time.
    pub fn local(player_id: PlayerId, previous: Option<String>, nickname: Option<String>) -> Self {
        Self {
            player_id,
            previous,
            nickname,
            origin: EventOrigin::Local,
            timestamp: current_timestamp_millis(),
        }
    }
}

/// Event published when a player's muted flag flips.
///
/// Relayed as profile sync so a player muted on one server stays muted
/// everywhere their profile is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteStateChangedEvent {
    /// ID of the player whose mute state changed
    pub player_id: PlayerId,
    /// True when the player is now muted
    pub muted: bool,
    /// Which server this change originated on
    pub origin: EventOrigin,
    /// Unix timestamp in milliseconds when the change was applied
    pub timestamp: u64,
}

impl MuteStateChangedEvent {
    /// Builds a locally-originated mute change stamped with the current time.
    pub fn local(player_id: PlayerId, muted: bool) -> Self {
        Self {
            player_id,
            muted,
            origin: EventOrigin::Local,
            timestamp: current_timestamp_millis(),
        }
    }
}

/// Event published when a player joins or leaves a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMembershipChangedEvent {
    /// ID of the player whose membership changed
    pub player_id: PlayerId,
    /// Channel joined or left
    pub channel: ChannelName,
    /// True when the player joined, false when they left
    pub joined: bool,
    /// Which server this change originated on
    pub origin: EventOrigin,
    /// Unix timestamp in milliseconds when the change was applied
    pub timestamp: u64,
}

impl ChannelMembershipChangedEvent {
    /// Builds a locally-originated membership change stamped with the current time.
    pub fn local(player_id: PlayerId, channel: ChannelName, joined: bool) -> Self {
        Self {
            player_id,
            channel,
            joined,
            origin: EventOrigin::Local,
            timestamp: current_timestamp_millis(),
        }
    }
}

/// Event published when a player's profile becomes live on this server.
///
/// Join events stay local; each server announces its own joins. The save
/// scheduler subscribes to mark the fresh record dirty so a first-time
/// profile reaches storage even if the player never speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinedEvent {
    /// ID of the player who joined
    pub player_id: PlayerId,
    /// Account name of the player
    pub username: String,
    /// Unix timestamp in milliseconds when the player joined
    pub timestamp: u64,
}

impl PlayerJoinedEvent {
    /// Builds a join event stamped with the current time.
    pub fn now(player_id: PlayerId, username: String) -> Self {
        Self {
            player_id,
            username,
            timestamp: current_timestamp_millis(),
        }
    }
}
