//! Pairwise similarity cache with least-frequently-used eviction.
//!
//! Scores are keyed by a canonical unordered pair key so `(a, b)` and `(b, a)`
//! share one slot. A single mutex guards both the score map and the access
//! counters; every lookup and insert takes it for one short critical section.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::metrics::{default_metrics, EngineMetrics};

mod precompute;


pub use precompute::{precompute_pairs, PrecomputeStats};

/// Packs an unordered id pair into one key, smaller id in the high 32 bits.
#[inline]
pub fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (u64::from(lo) << 32) | u64::from(hi)
}

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Lookups that found a stored score.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries removed by eviction passes.
    pub evictions: u64,
    /// Entries currently stored.
    pub entries: usize,
}

#[derive(Default)]
struct Slots {
    scores: FxHashMap<u64, f64>,
    access: FxHashMap<u64, u64>,
}

/// Bounded map of pair similarities shared between precompute workers and
/// query paths.
pub struct SimilarityCache {
    name: &'static str,
    capacity: usize,
    slots: Mutex<Slots>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    metrics: Arc<dyn EngineMetrics>,
}

impl SimilarityCache {
    /// Creates an empty cache that trims itself once it exceeds `capacity`.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self::with_metrics(name, capacity, default_metrics())
    }

    /// Creates an empty cache reporting to `metrics`.
    pub fn with_metrics(
        name: &'static str,
        capacity: usize,
        metrics: Arc<dyn EngineMetrics>,
    ) -> Self {
        Self {
            name,
            capacity,
            slots: Mutex::new(Slots::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            metrics,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored scores.
    pub fn len(&self) -> usize {
        self.slots.lock().scores.len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `score` for the pair and resets its access count to 1.
    pub fn insert(&self, a: u32, b: u32, score: f64) {
        let key = pair_key(a, b);
        let mut slots = self.slots.lock();
        slots.scores.insert(key, score);
        slots.access.insert(key, 1);
    }

    /// Looks up the pair, bumping its access count on a hit.
    pub fn get(&self, a: u32, b: u32) -> Option<f64> {
        let key = pair_key(a, b);
        let found = {
            let mut slots = self.slots.lock();
            let found = slots.scores.get(&key).copied();
            if found.is_some() {
                *slots.access.entry(key).or_insert(0) += 1;
            }
            found
        };
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.metrics.cache_lookup(self.name, found.is_some());
        found
    }

    /// Access count of the pair, if cached.
    pub fn access_count(&self, a: u32, b: u32) -> Option<u64> {
        self.slots.lock().access.get(&pair_key(a, b)).copied()
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        slots.scores.clear();
        slots.access.clear();
    }

    /// Runs an eviction pass when the cache holds more than its capacity.
    ///
    /// Returns the number of removed entries.
    pub fn evict_if_needed(&self) -> usize {
        let mut slots = self.slots.lock();
        if slots.scores.len() <= self.capacity {
            return 0;
        }
        let removed = Self::evict_locked(&mut slots, self.capacity / 2);
        drop(slots);

        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        self.metrics.cache_evicted(self.name, removed);
        debug!(
            cache = self.name,
            removed,
            capacity = self.capacity,
            "cache.evict"
        );
        removed
    }

    /// Removes the least-accessed entries until at most `target` remain.
    fn evict_locked(slots: &mut Slots, target: usize) -> usize {
        let excess = slots.scores.len().saturating_sub(target);
        if excess == 0 {
            return 0;
        }
        let mut by_access: Vec<(u64, u64)> = slots
            .scores
            .keys()
            .map(|key| (*key, slots.access.get(key).copied().unwrap_or(0)))
            .collect();
        by_access.sort_by_key(|&(_, count)| count);

        for &(key, _) in by_access.iter().take(excess) {
            slots.scores.remove(&key);
            slots.access.remove(&key);
        }
        excess
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
