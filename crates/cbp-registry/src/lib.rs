//! Semantic Registry (C2)
//!
//! A bounded, content-addressed store used by the CBP codec to deduplicate
//! repeated payloads (e.g. a pipeline `A -> B -> C` re-forwarding the same
//! analysis) and to reconstruct reference-only frames on decode.
//!
//! Concurrency: [`SemanticRegistry`] is shared by every encoder and decoder
//! in a process. The data itself lives in a [`dashmap::DashMap`] (a sharded
//! map, preferred here for throughput); insertion order — needed for
//! eviction — is tracked separately behind one [`parking_lot::Mutex`],
//! since `DashMap` itself has no concept of insertion order.
//!
//! Eviction is strictly insertion-order: a hit never refreshes an entry's
//! position. This is deliberate — it is *not* LRU, and
//! must not be "upgraded" to LRU.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Default capacity if a caller doesn't pick one explicitly.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    ref_count: u32,
    #[allow(dead_code)] // kept for future diagnostics
    inserted_at: Instant,
}

/// Snapshot of registry counters returned by `stats()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_refs: u64,
}

pub struct SemanticRegistry {
    capacity: usize,
    entries: DashMap<u64, Entry>,
    /// Strict insertion order, oldest first. Never reordered on a hit.
    order: Mutex<VecDeque<u64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SemanticRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The 64-bit content hash used both as the registry key and as a
    /// `delta_ref` prefix. The hash appears on-wire, so wire-compatible
    /// deployments must agree on the same function.
    #[must_use]
    pub fn hash_bytes(bytes: &[u8]) -> u64 {
        xxhash_rust::xxh64::xxh64(bytes, 0)
    }

    /// `store_or_ref(bytes) -> (hash, is_new, bytes_saved)`.
    ///
    /// If the hash already exists, its `ref_count` is incremented and
    /// `bytes_saved = len(bytes) - 8` (the 8-byte reference that now stands
    /// in for the full payload). Otherwise the payload is inserted, evicting
    /// the oldest entry first if the registry is at capacity.
    pub fn store_or_ref(&self, bytes: &[u8]) -> (u64, bool, usize) {
        let hash = Self::hash_bytes(bytes);

        if let Some(mut entry) = self.entries.get_mut(&hash) {
            entry.ref_count += 1;
            self.hits.fetch_add(1, Ordering::Relaxed);
            let saved = bytes.len().saturating_sub(8);
            return (hash, false, saved);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.insert_new(hash, bytes);
        (hash, true, 0)
    }

    fn insert_new(&self, hash: u64, bytes: &[u8]) {
        let mut order = self.order.lock();

        // Another thread may have inserted the same hash between our `get`
        // miss above and taking this lock; re-check under the order lock.
        if self.entries.contains_key(&hash) {
            return;
        }

        while self.entries.len() >= self.capacity {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }

        self.entries.insert(
            hash,
            Entry {
                bytes: bytes.to_vec(),
                ref_count: 1,
                inserted_at: Instant::now(),
            },
        );
        order.push_back(hash);
    }

    /// `get(hash) -> bytes | none`. A `none` here during
    /// decode of a dedup-referenced frame is an unrecoverable decode error
    /// for that frame — the registry itself just reports absence.
    #[must_use]
    pub fn get(&self, hash: u64) -> Option<Vec<u8>> {
        self.entries.get(&hash).map(|e| e.bytes.clone())
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let total_refs: u64 = self
            .entries
            .iter()
            .map(|e| u64::from(e.ref_count))
            .sum();
        RegistryStats {
            entries: self.entries.len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            total_refs,
        }
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

impl Default for SemanticRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_store_is_new_second_is_ref() {
        let reg = SemanticRegistry::new(16);
        let (h1, new1, saved1) = reg.store_or_ref(b"hello world");
        assert!(new1);
        assert_eq!(saved1, 0);

        let (h2, new2, saved2) = reg.store_or_ref(b"hello world");
        assert_eq!(h1, h2);
        assert!(!new2);
        assert_eq!(saved2, b"hello world".len() - 8);
    }

    #[test]
    fn get_returns_stored_bytes() {
        let reg = SemanticRegistry::new(16);
        let (hash, _, _) = reg.store_or_ref(b"payload");
        assert_eq!(reg.get(hash), Some(b"payload".to_vec()));
        assert_eq!(reg.get(hash.wrapping_add(1)), None);
    }

    #[test]
    fn eviction_is_strict_insertion_order_not_lru() {
        let reg = SemanticRegistry::new(2);
        let (h_a, ..) = reg.store_or_ref(b"a");
        let (h_b, ..) = reg.store_or_ref(b"b");

        // Hitting `a` again must NOT refresh its position.
        reg.store_or_ref(b"a");

        // Inserting a third distinct entry evicts the oldest (`a`), even
        // though `a` was the most recently *hit*.
        let (h_c, ..) = reg.store_or_ref(b"c");

        assert_eq!(reg.get(h_a), None, "oldest insert must be evicted despite being hit");
        assert_eq!(reg.get(h_b), Some(b"b".to_vec()));
        assert_eq!(reg.get(h_c), Some(b"c".to_vec()));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn stats_track_hits_misses_and_refs() {
        let reg = SemanticRegistry::new(16);
        reg.store_or_ref(b"x"); // miss -> new
        reg.store_or_ref(b"x"); // hit
        reg.store_or_ref(b"y"); // miss -> new

        let stats = reg.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 1);
        assert!((stats.hit_rate - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(stats.total_refs, 3); // x has ref_count 2, y has 1
    }

    #[test]
    fn concurrent_store_of_same_payload_yields_one_entry() {
        use std::sync::Arc;
        use std::thread;

        let reg = Arc::new(SemanticRegistry::new(64));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let reg = Arc::clone(&reg);
            handles.push(thread::spawn(move || reg.store_or_ref(b"shared-payload")));
        }
        let mut new_count = 0;
        for h in handles {
            let (_, is_new, _) = h.join().unwrap();
            if is_new {
                new_count += 1;
            }
        }
        assert_eq!(new_count, 1, "exactly one thread should observe a fresh insert");
        assert_eq!(reg.len(), 1);
    }
}
