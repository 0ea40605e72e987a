//! # Herald Core
//!
//! Cross-server chat distribution for game server fleets. This crate owns the
//! pieces that sit between gameplay code and the wire: channel configuration,
//! player profiles, the packet layer that relays chat between servers, and the
//! scheduler that persists profile changes.
//!
//! ## Architecture
//!
//! - **Channels**: named broadcast scopes loaded from TOML and swapped
//!   atomically on reload ([`ChannelRegistry`])
//! - **Players**: in-memory profile records plus the [`PlayerStore`] trait the
//!   host implements for persistence
//! - **Messaging**: the [`PacketService`] transport contract, the packet
//!   envelope codec, the bounded [`SignatureCache`], and the
//!   [`MessagingManager`] that bridges local events onto the wire
//! - **Chat**: the submission pipeline that turns player input into
//!   [`ChatMessageEvent`]s ([`ChatPipeline`])
//! - **Moderation**: mute toggling and cross-server message deletion
//! - **Saves**: dirty tracking and periodic profile flushing ([`SaveScheduler`])
//!
//! Everything in this crate communicates through the synchronous event bus in
//! [`herald_events`]; nothing here talks to a concrete network or database.
//!
//! [`ChatMessageEvent`]: herald_events::ChatMessageEvent

pub mod channels;
pub mod chat;
pub mod messaging;
pub mod moderation;
pub mod permissions;
pub mod players;
pub mod render;
pub mod saves;


// ============================================================================
// Public API Re-exports
// ============================================================================

pub use channels::{ChannelConfigError, ChannelRegistry, ChannelSettings, ChannelsConfig, ChatChannel};
pub use chat::{ChatOutcome, ChatPipeline};
pub use messaging::{
    ChatRelayPayload, DeleteRequestPayload, MemoryBus, MemoryBusFactory, MemoryPacketService,
    Messaging, MessagingManager, PacketDecodeError, PacketEnvelope, PacketKind, PacketService,
    PacketServiceFactory, PacketSink, ProfileSyncPayload, SignatureCache, SignatureRecord,
    TransportError, DEFAULT_SIGNATURE_CAPACITY,
};
pub use moderation::{DeleteOutcome, Moderation, MuteOutcome};
pub use permissions::{PermissionProvider, StaticPermissions, MUTE_EXEMPT};
pub use players::{JsonFileStore, PersistError, PlayerRecord, PlayerRegistry, PlayerStore, UnknownPlayer};
pub use render::{BasicRenderer, MessageRenderer, RenderedMessage};
pub use saves::{FlushReport, SaveScheduler, DEFAULT_SAVE_INTERVAL};
