//! Packet envelope codec.
//!
//! Every cross-server packet shares a fixed binary header followed by a JSON
//! body. The header is what the receive path needs before it can decide
//! anything: the packet kind, the originating server (for self-echo
//! suppression), and the send timestamp.
//!
//! ## Wire Format
//!
//! ```text
//! [kind: u16 LE][origin: 16 bytes UUID][sent_at: u64 LE millis][payload: JSON]
//! ```
//!
//! Integers are little-endian. The payload encoding is JSON so packets stay
//! debuggable on the wire; the header stays binary so routing never has to
//! parse a body it may be about to discard.

use herald_events::{ChannelName, MessageId, PlayerId, ServerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Envelope header length in bytes: kind (2) + origin (16) + sent_at (8).
pub const HEADER_LEN: usize = 26;

/// Wire codes for packet kinds.
pub mod kinds {
    /// Chat message relay
    pub const CHAT_RELAY: u16 = 0x0001;
    /// Fleet-wide message deletion request
    pub const DELETE_REQUEST: u16 = 0x0002;
    /// Player profile synchronization
    pub const PROFILE_SYNC: u16 = 0x0003;
}

/// Transport topics, one per packet kind. Hosts multiplexing several
/// systems over one transport route by topic before anything is decoded;
/// the header's kind code stays authoritative on the receive path.
pub mod topics {
    /// Chat message relay
    pub const CHAT_RELAY: &str = "herald.chat";
    /// Fleet-wide message deletion request
    pub const DELETE_REQUEST: &str = "herald.delete";
    /// Player profile synchronization
    pub const PROFILE_SYNC: &str = "herald.profile";
}

/// The kinds of packet herald puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// A chat message relayed to the rest of the fleet
    ChatRelay,
    /// A request that every server retract a message
    DeleteRequest,
    /// A player profile change
    ProfileSync,
}

impl PacketKind {
    /// Every kind, in wire-code order. The manager subscribes to each
    /// kind's topic on start.
    pub const ALL: [PacketKind; 3] = [
        PacketKind::ChatRelay,
        PacketKind::DeleteRequest,
        PacketKind::ProfileSync,
    ];

    /// Wire code for this kind.
    pub fn code(self) -> u16 {
        match self {
            PacketKind::ChatRelay => kinds::CHAT_RELAY,
            PacketKind::DeleteRequest => kinds::DELETE_REQUEST,
            PacketKind::ProfileSync => kinds::PROFILE_SYNC,
        }
    }

    /// Maps a wire code back to a kind.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            kinds::CHAT_RELAY => Some(PacketKind::ChatRelay),
            kinds::DELETE_REQUEST => Some(PacketKind::DeleteRequest),
            kinds::PROFILE_SYNC => Some(PacketKind::ProfileSync),
            _ => None,
        }
    }

    /// Transport topic this kind travels on.
    pub fn topic(self) -> &'static str {
        match self {
            PacketKind::ChatRelay => topics::CHAT_RELAY,
            PacketKind::DeleteRequest => topics::DELETE_REQUEST,
            PacketKind::ProfileSync => topics::PROFILE_SYNC,
        }
    }
}

/// Errors raised while decoding an inbound packet.
#[derive(Debug, Error)]
pub enum PacketDecodeError {
    /// The data is shorter than the fixed header.
    #[error("packet too short: {0} bytes")]
    Truncated(usize),

    /// The kind code is not one this version understands.
    #[error("unknown packet kind: {0:#06x}")]
    UnknownKind(u16),

    /// The header decoded but the JSON body did not match the kind.
    #[error("malformed {kind:?} payload: {source}")]
    Payload {
        kind: PacketKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded packet: fixed header plus still-encoded JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEnvelope {
    /// What the payload contains
    pub kind: PacketKind,
    /// Server that broadcast this packet
    pub origin: ServerId,
    /// Milliseconds since epoch at send time
    pub sent_at: u64,
    /// JSON-encoded body
    pub payload: Vec<u8>,
}

impl PacketEnvelope {
    /// Builds an envelope around an already-encoded payload, stamping the
    /// send time.
    pub fn new(kind: PacketKind, origin: ServerId, payload: Vec<u8>) -> Self {
        Self {
            kind,
            origin,
            sent_at: herald_events::current_timestamp_millis(),
            payload,
        }
    }

    /// Builds an envelope by JSON-encoding a payload value.
    pub fn with_payload<T: Serialize>(
        kind: PacketKind,
        origin: ServerId,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, origin, serde_json::to_vec(payload)?))
    }

    /// Serializes the envelope to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.payload.len());
        data.extend_from_slice(&self.kind.code().to_le_bytes());
        data.extend_from_slice(self.origin.0.as_bytes());
        data.extend_from_slice(&self.sent_at.to_le_bytes());
        data.extend_from_slice(&self.payload);
        data
    }

    /// Deserializes an envelope from wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, PacketDecodeError> {
        if data.len() < HEADER_LEN {
            return Err(PacketDecodeError::Truncated(data.len()));
        }

        let code = u16::from_le_bytes([data[0], data[1]]);
        let kind = PacketKind::from_code(code).ok_or(PacketDecodeError::UnknownKind(code))?;

        let mut origin_bytes = [0u8; 16];
        origin_bytes.copy_from_slice(&data[2..18]);
        let origin = ServerId(Uuid::from_bytes(origin_bytes));

        let sent_at = u64::from_le_bytes([
            data[18], data[19], data[20], data[21], data[22], data[23], data[24], data[25],
        ]);

        Ok(Self {
            kind,
            origin,
            sent_at,
            payload: data[HEADER_LEN..].to_vec(),
        })
    }

    /// Decodes the JSON body into a payload type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, PacketDecodeError> {
        serde_json::from_slice(&self.payload).map_err(|source| PacketDecodeError::Payload {
            kind: self.kind,
            source,
        })
    }
}

// ============================================================================
// Payload Types
// ============================================================================

/// Body of a [`PacketKind::ChatRelay`] packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRelayPayload {
    /// Fleet-wide message identity
    pub message_id: MessageId,
    /// Player who sent the message
    pub sender: PlayerId,
    /// Display name at send time; receiving servers may not have the
    /// sender's profile loaded
    pub sender_name: String,
    /// Channel the message was spoken in
    pub channel: ChannelName,
    /// Raw message text
    pub content: String,
}

/// Body of a [`PacketKind::DeleteRequest`] packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequestPayload {
    /// Message every server should retract
    pub message_id: MessageId,
}

/// Body of a [`PacketKind::ProfileSync`] packet: one profile change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileSyncPayload {
    /// Nickname was set or cleared
    Nickname {
        player_id: PlayerId,
        previous: Option<String>,
        nickname: Option<String>,
    },
    /// Muted flag flipped
    Mute { player_id: PlayerId, muted: bool },
    /// Channel membership changed
    Membership {
        player_id: PlayerId,
        channel: ChannelName,
        joined: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let origin = ServerId::new();
        let payload = ChatRelayPayload {
            message_id: MessageId::new(),
            sender: PlayerId::new(),
            sender_name: "Steve".to_string(),
            channel: ChannelName::from("global"),
            content: "hello fleet".to_string(),
        };

        let envelope =
            PacketEnvelope::with_payload(PacketKind::ChatRelay, origin, &payload).unwrap();
        let decoded = PacketEnvelope::decode(&envelope.encode()).unwrap();

        assert_eq!(decoded.kind, PacketKind::ChatRelay);
        assert_eq!(decoded.origin, origin);
        assert_eq!(decoded.sent_at, envelope.sent_at);
        assert_eq!(decoded.parse_payload::<ChatRelayPayload>().unwrap(), payload);
    }

    #[test]
    fn test_header_layout_is_stable() {
        let origin = ServerId(Uuid::nil());
        let mut envelope = PacketEnvelope::new(PacketKind::DeleteRequest, origin, Vec::new());
        envelope.sent_at = 1;

        let data = envelope.encode();
        assert_eq!(data.len(), HEADER_LEN);
        assert_eq!(&data[0..2], &[0x02, 0x00]);
        assert_eq!(&data[2..18], &[0u8; 16]);
        assert_eq!(&data[18..26], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let result = PacketEnvelope::decode(&[0x01, 0x00, 0xFF]);
        assert!(matches!(result, Err(PacketDecodeError::Truncated(3))));
    }

    #[test]
    fn test_each_kind_has_its_own_topic() {
        let mut seen: Vec<_> = PacketKind::ALL.iter().map(|kind| kind.topic()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), PacketKind::ALL.len());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let envelope = PacketEnvelope::new(PacketKind::ChatRelay, ServerId::new(), Vec::new());
        let mut data = envelope.encode();
        data[0] = 0xEE;
        data[1] = 0xEE;

        let result = PacketEnvelope::decode(&data);
        assert!(matches!(result, Err(PacketDecodeError::UnknownKind(0xEEEE))));
    }

    #[test]
    fn test_malformed_payload_reports_kind() {
        let envelope = PacketEnvelope::new(
            PacketKind::DeleteRequest,
            ServerId::new(),
            b"not json at all".to_vec(),
        );

        let result = envelope.parse_payload::<DeleteRequestPayload>();
        assert!(matches!(
            result,
            Err(PacketDecodeError::Payload {
                kind: PacketKind::DeleteRequest,
                ..
            })
        ));
    }

    #[test]
    fn test_profile_sync_variants_round_trip() {
        let player_id = PlayerId::new();
        let payload = ProfileSyncPayload::Membership {
            player_id,
            channel: ChannelName::from("staff"),
            joined: true,
        };

        let envelope =
            PacketEnvelope::with_payload(PacketKind::ProfileSync, ServerId::new(), &payload)
                .unwrap();
        let decoded = PacketEnvelope::decode(&envelope.encode()).unwrap();

        assert_eq!(decoded.parse_payload::<ProfileSyncPayload>().unwrap(), payload);
    }
}
