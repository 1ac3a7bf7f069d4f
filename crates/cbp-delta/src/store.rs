//! Short-term `base_hash -> base` map, so a delta can be
//! reconstructed even after the Semantic Registry has evicted the
//! underlying bytes for that hash.
//!
//! Same eviction discipline as `cbp-registry::SemanticRegistry`: strict
//! insertion order, never refreshed on a hit.

use parking_lot::Mutex;
use rmpv::Value;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 4096;

struct Inner {
    bases: HashMap<u64, Value>,
    order: VecDeque<u64>,
}

pub struct DeltaStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl DeltaStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                bases: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Remember `base` under `hash` for future delta reconstruction.
    pub fn remember(&self, hash: u64, base: Value) {
        let mut inner = self.inner.lock();
        if inner.bases.contains_key(&hash) {
            return;
        }
        while inner.bases.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.bases.remove(&oldest);
        }
        inner.bases.insert(hash, base);
        inner.order.push_back(hash);
    }

    #[must_use]
    pub fn get(&self, hash: u64) -> Option<Value> {
        self.inner.lock().bases.get(&hash).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeltaStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
