//! Cross-server packet layer: envelope codec, transport contract, signature
//! cache, and the manager that ties them to the event bus.

pub mod manager;
pub mod memory;
pub mod packet;
pub mod service;
pub mod signatures;

pub use manager::{Messaging, MessagingManager};
pub use memory::{MemoryBus, MemoryBusFactory, MemoryPacketService};
pub use packet::topics;
pub use packet::{
    ChatRelayPayload, DeleteRequestPayload, PacketDecodeError, PacketEnvelope, PacketKind,
    ProfileSyncPayload, HEADER_LEN,
};
pub use service::{PacketService, PacketServiceFactory, PacketSink, TransportError};
pub use signatures::{
    EvictionCallback, SignatureCache, SignatureRecord, DEFAULT_SIGNATURE_CAPACITY,
};
