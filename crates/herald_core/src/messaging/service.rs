//! Transport contract for cross-server packets.
//!
//! Herald never owns a network connection. The host supplies an
//! implementation of [`PacketService`] over whatever fabric it runs (a
//! message broker, a proxy plugin channel, the in-process [`MemoryBus`] in
//! tests) and herald publishes and subscribes through it.
//!
//! Delivery expectations are deliberately weak: at-least-once to the
//! subscribers present at publish time, no ordering across topics, and a
//! transport is free to echo a server's own packets back to it. The
//! messaging layer is built to tolerate all of that.
//!
//! [`MemoryBus`]: crate::messaging::MemoryBus

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Handler invoked for each packet arriving on a subscribed topic.
///
/// Sinks run on transport delivery tasks and must not block.
pub type PacketSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Errors surfaced by packet transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport cannot currently move packets. Publishing while
    /// disconnected surfaces this rather than blocking or buffering.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The service was shut down and will not carry further traffic.
    #[error("transport closed")]
    Closed,
}

/// A connected packet transport.
#[async_trait]
pub trait PacketService: Send + Sync {
    /// Publishes an opaque packet on a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Registers a sink for packets arriving on a topic.
    ///
    /// Subscriptions last until [`shutdown`](Self::shutdown); there is no
    /// per-subscription removal.
    async fn subscribe(&self, topic: &str, sink: PacketSink) -> Result<(), TransportError>;

    /// Tears down this service's subscriptions and releases the connection.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Builds connected [`PacketService`] instances.
///
/// Connection happens lazily, on the first real messaging use, so a factory
/// must be cheap to construct even when the backing transport is down;
/// failures belong in [`connect`](Self::connect).
#[async_trait]
pub trait PacketServiceFactory: Send + Sync {
    /// Establishes a connection and returns the live service.
    async fn connect(&self) -> Result<Arc<dyn PacketService>, TransportError>;
}
