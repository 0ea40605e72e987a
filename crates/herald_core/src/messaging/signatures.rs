//! Bounded cache of recently relayed message signatures.
//!
//! Deleting a message fleet-wide needs per-message state on every server that
//! saw it: who sent it, where, and the opaque signature token the platform
//! may need to retract a signed message. Only the most recent handful of
//! messages are deletable, so the cache is a small LRU rather than a log.
//!
//! Recency is tracked with a per-entry atomic stamp from a shared logical
//! clock. Lookups refresh the stamp without taking a write lock on the map;
//! eviction scans for the smallest stamp when an insert pushes the cache
//! over capacity.

use dashmap::DashMap;
use herald_events::{ChannelName, MessageId, PlayerId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// How many messages stay deletable by default.
pub const DEFAULT_SIGNATURE_CAPACITY: usize = 10;

/// Called with each entry evicted to make room.
pub type EvictionCallback = Arc<dyn Fn(MessageId, SignatureRecord) + Send + Sync>;

/// Everything retained about a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Player who sent the message
    pub sender: PlayerId,
    /// Channel it was spoken in
    pub channel: ChannelName,
    /// Opaque platform signature token, when the host supplied one
    pub signature: Option<String>,
}

impl SignatureRecord {
    /// Creates an unsigned record.
    pub fn new(sender: PlayerId, channel: ChannelName) -> Self {
        Self {
            sender,
            channel,
            signature: None,
        }
    }
}

struct CacheSlot {
    record: SignatureRecord,
    stamp: AtomicU64,
}

/// Thread-safe LRU of message-id to [`SignatureRecord`].
pub struct SignatureCache {
    entries: DashMap<MessageId, CacheSlot>,
    capacity: usize,
    clock: AtomicU64,
    on_evict: Option<EvictionCallback>,
}

impl SignatureCache {
    /// Creates a cache bounded to `capacity` entries. A capacity of zero is
    /// clamped to one; a cache that cannot hold anything cannot serve
    /// deletions at all.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(1),
            on_evict: None,
        }
    }

    /// Like [`new`](Self::new), additionally invoking `on_evict` for every
    /// entry dropped to make room.
    pub fn with_eviction_callback(capacity: usize, on_evict: EvictionCallback) -> Self {
        Self {
            on_evict: Some(on_evict),
            ..Self::new(capacity)
        }
    }

    fn next_stamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    /// Remembers a message, evicting the least recently used entries if the
    /// cache is full. Remembering an already-known id refreshes it in place.
    pub fn remember(&self, message_id: MessageId, record: SignatureRecord) {
        let stamp = AtomicU64::new(self.next_stamp());
        self.entries.insert(message_id, CacheSlot { record, stamp });
        self.trim();
    }

    fn trim(&self) {
        // Concurrent writers may both see the cache over capacity and each
        // evict an entry; the loop guarantees we never finish above the cap.
        while self.entries.len() > self.capacity {
            let mut oldest: Option<(MessageId, u64)> = None;
            for entry in self.entries.iter() {
                let stamp = entry.value().stamp.load(Ordering::SeqCst);
                if oldest.map(|(_, s)| stamp < s).unwrap_or(true) {
                    oldest = Some((*entry.key(), stamp));
                }
            }
            let Some((victim, _)) = oldest else {
                break;
            };
            if let Some((id, slot)) = self.entries.remove(&victim) {
                debug!("Evicted message {} from signature cache", id);
                if let Some(on_evict) = &self.on_evict {
                    on_evict(id, slot.record);
                }
            }
        }
    }

    /// Returns the record for a message and marks it recently used.
    pub fn lookup(&self, message_id: &MessageId) -> Option<SignatureRecord> {
        let slot = self.entries.get(message_id)?;
        slot.stamp.store(self.next_stamp(), Ordering::SeqCst);
        Some(slot.record.clone())
    }

    /// Removes and returns the record for a message. A second take of the
    /// same id yields `None`.
    pub fn take(&self, message_id: &MessageId) -> Option<SignatureRecord> {
        self.entries.remove(message_id).map(|(_, slot)| slot.record)
    }

    /// Returns `true` if the message is still deletable.
    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.entries.contains_key(message_id)
    }

    /// IDs of every message currently in the cache, in no particular order.
    pub fn known_ids(&self) -> Vec<MessageId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    /// String forms of [`known_ids`](Self::known_ids), for command
    /// completion on message-id arguments.
    pub fn id_suggestions(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().to_string()).collect()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_CAPACITY)
    }
}

impl std::fmt::Debug for SignatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record() -> SignatureRecord {
        SignatureRecord::new(PlayerId::new(), ChannelName::from("global"))
    }

    #[test]
    fn never_exceeds_capacity() {
        let cache = SignatureCache::new(10);
        for _ in 0..25 {
            cache.remember(MessageId::new(), record());
        }
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn oldest_entry_evicted_first() {
        let cache = SignatureCache::new(3);
        let first = MessageId::new();
        let rest: Vec<MessageId> = (0..3).map(|_| MessageId::new()).collect();

        cache.remember(first, record());
        for id in &rest {
            cache.remember(*id, record());
        }

        assert!(!cache.contains(&first));
        for id in &rest {
            assert!(cache.contains(id));
        }
    }

    #[test]
    fn lookup_refreshes_recency() {
        let cache = SignatureCache::new(3);
        let keep = MessageId::new();
        let b = MessageId::new();
        let c = MessageId::new();

        cache.remember(keep, record());
        cache.remember(b, record());
        cache.remember(c, record());

        // Touching `keep` makes `b` the oldest entry.
        assert!(cache.lookup(&keep).is_some());
        cache.remember(MessageId::new(), record());

        assert!(cache.contains(&keep));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn take_consumes_the_record() {
        let cache = SignatureCache::new(10);
        let id = MessageId::new();
        let sender = PlayerId::new();
        cache.remember(id, SignatureRecord::new(sender, ChannelName::from("global")));

        let taken = cache.take(&id).unwrap();
        assert_eq!(taken.sender, sender);
        assert!(cache.take(&id).is_none());
        assert!(cache.lookup(&id).is_none());
    }

    #[test]
    fn miss_returns_none() {
        let cache = SignatureCache::new(10);
        assert!(cache.lookup(&MessageId::new()).is_none());
    }

    #[test]
    fn rewriting_an_id_does_not_grow_the_cache() {
        let cache = SignatureCache::new(10);
        let id = MessageId::new();
        cache.remember(id, record());
        cache.remember(id, record());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_callback_sees_dropped_entries() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let evicted_clone = evicted.clone();
        let cache = SignatureCache::with_eviction_callback(
            2,
            Arc::new(move |id, _record| {
                evicted_clone.lock().unwrap().push(id);
            }),
        );

        let first = MessageId::new();
        cache.remember(first, record());
        cache.remember(MessageId::new(), record());
        cache.remember(MessageId::new(), record());

        assert_eq!(evicted.lock().unwrap().as_slice(), [first]);
    }

    #[test]
    fn id_suggestions_cover_cached_messages() {
        let cache = SignatureCache::new(10);
        let id = MessageId::new();
        cache.remember(id, record());

        let suggestions = cache.id_suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0], id.to_string());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = SignatureCache::new(0);
        let id = MessageId::new();
        cache.remember(id, record());
        assert_eq!(cache.capacity(), 1);
        assert!(cache.contains(&id));
    }

    #[test]
    fn concurrent_remembers_stay_bounded() {
        let cache = Arc::new(SignatureCache::new(10));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    cache.remember(MessageId::new(), record());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 10);
        assert!(!cache.is_empty());
    }
}
