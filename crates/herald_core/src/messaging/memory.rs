//! In-process packet transport.
//!
//! A [`MemoryBus`] connects any number of [`MemoryPacketService`]s inside one
//! process. It exists for tests and single-process deployments: two messaging
//! managers connected to the same bus behave like two servers sharing a
//! broker, including the part where a publisher hears its own packets back.

use crate::messaging::service::{PacketService, PacketServiceFactory, PacketSink, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

struct SinkEntry {
    service: u64,
    sink: PacketSink,
}

/// Shared hub all in-process services publish through.
pub struct MemoryBus {
    topics: DashMap<String, Vec<SinkEntry>>,
    next_service: AtomicU64,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: DashMap::new(),
            next_service: AtomicU64::new(1),
        })
    }

    /// Connects a new service to this bus.
    pub fn connect(self: &Arc<Self>) -> Arc<MemoryPacketService> {
        let service_id = self.next_service.fetch_add(1, Ordering::SeqCst);
        debug!("Memory bus service {} connected", service_id);
        Arc::new(MemoryPacketService {
            bus: self.clone(),
            service_id,
            closed: AtomicBool::new(false),
        })
    }

    fn remove_service(&self, service_id: u64) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().retain(|s| s.service != service_id);
        }
    }
}

/// One connected endpoint on a [`MemoryBus`].
pub struct MemoryPacketService {
    bus: Arc<MemoryBus>,
    service_id: u64,
    closed: AtomicBool,
}

#[async_trait]
impl PacketService for MemoryPacketService {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        // Snapshot the sinks and release the shard before delivering.
        // Every sink on the topic gets the packet, the publisher's own
        // included; suppression of self-traffic is the subscriber's job.
        let sinks: Vec<PacketSink> = match self.bus.topics.get(topic) {
            Some(entries) => entries.iter().map(|s| s.sink.clone()).collect(),
            None => Vec::new(),
        };

        if sinks.is_empty() {
            trace!("No subscribers on topic {}", topic);
            return Ok(());
        }

        for sink in sinks {
            let payload = payload.clone();
            tokio::spawn(async move {
                sink(payload);
            });
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, sink: PacketSink) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        self.bus
            .topics
            .entry(topic.to_string())
            .or_insert_with(Vec::new)
            .push(SinkEntry {
                service: self.service_id,
                sink,
            });
        debug!("Memory bus service {} subscribed to {}", self.service_id, topic);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.bus.remove_service(self.service_id);
        debug!("Memory bus service {} shut down", self.service_id);
        Ok(())
    }
}

/// Factory handing out services connected to one shared bus.
pub struct MemoryBusFactory {
    bus: Arc<MemoryBus>,
}

impl MemoryBusFactory {
    /// Creates a factory for the given bus.
    pub fn new(bus: Arc<MemoryBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl PacketServiceFactory for MemoryBusFactory {
    async fn connect(&self) -> Result<Arc<dyn PacketService>, TransportError> {
        Ok(self.bus.connect())
    }
}
