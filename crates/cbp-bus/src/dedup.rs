//! Request deduplication cache. Keyed by a fingerprint of
//! `{ receiver, content }`; entries expire after a caller-configurable TTL
//! (default 10 s).

use cbp_codec::{canonicalize, StructuredMessage, Value};
use cbp_schema::AgentId;
use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// `fingerprint({ receiver, content })` via the same 64-bit hash function
/// the Semantic Registry uses, applied to the canonicalized, serialized
/// `{ receiver, content }` pair.
#[must_use]
pub fn fingerprint(receiver: AgentId, content: &Value) -> u64 {
    let pair = Value::Map(vec![
        (Value::from("receiver"), Value::from(receiver.0)),
        (Value::from("content"), canonicalize(content)),
    ]);
    let mut bytes = Vec::new();
    // `write_value` only fails on a writer I/O error, never on `Vec<u8>`.
    rmpv::encode::write_value(&mut bytes, &pair).expect("serializing to a Vec cannot fail");
    xxhash_rust::xxh64::xxh64(&bytes, 0)
}

struct Entry {
    reply: StructuredMessage,
    inserted_at: Instant,
    ttl: Duration,
}

/// A TTL cache of `fingerprint -> reply`. Expired entries are pruned lazily
/// on lookup; a background sweep (`Bus::start`'s periodic tick) also clears
/// them so the map doesn't grow unbounded between lookups.
#[derive(Default)]
pub struct DedupCache {
    entries: DashMap<u64, Entry>,
}

impl DedupCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<StructuredMessage> {
        let hit = self.entries.get(&key).and_then(|entry| {
            if entry.inserted_at.elapsed() < entry.ttl {
                Some(entry.reply.clone())
            } else {
                None
            }
        });
        if hit.is_none() {
            self.entries.remove(&key);
        }
        hit
    }

    pub fn insert(&self, key: u64, reply: StructuredMessage, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                reply,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Removes every entry whose TTL has elapsed. Called periodically by
    /// the bus's sweep task.
    pub fn sweep_expired(&self) {
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < entry.ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
