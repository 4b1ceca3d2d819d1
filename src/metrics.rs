//! Ingestion and cache counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking ingestion and cache activity in the recommendation engine.
///
/// Implementations collect statistics about graph upserts, dropped ratings and
/// similarity cache traffic. This information can be used for monitoring and
/// tuning cache capacity.
pub trait EngineMetrics: Send + Sync {
    /// Records an item upsert.
    fn item_upserted(&self);

    /// Records a user upsert.
    fn user_upserted(&self);

    /// Records ratings discarded because they referenced unknown items.
    fn ratings_dropped(&self, count: usize);

    /// Records a similarity cache lookup.
    ///
    /// # Parameters
    /// * `cache` - Which cache served the lookup: "collaborative" or "content".
    /// * `hit` - Whether the pair was present.
    fn cache_lookup(&self, cache: &'static str, hit: bool);

    /// Records entries removed by an eviction pass.
    fn cache_evicted(&self, cache: &'static str, removed: usize);
}

/// A no-op implementation of [`EngineMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl EngineMetrics for NoopMetrics {
    fn item_upserted(&self) {}
    fn user_upserted(&self) {}
    fn ratings_dropped(&self, _count: usize) {}
    fn cache_lookup(&self, _cache: &'static str, _hit: bool) {}
    fn cache_evicted(&self, _cache: &'static str, _removed: usize) {}
}

/// A thread-safe counter-based implementation of [`EngineMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of item upserts.
    pub items_upserted: AtomicU64,

    /// Number of user upserts.
    pub users_upserted: AtomicU64,

    /// Number of ratings dropped during ingestion.
    pub ratings_dropped: AtomicU64,

    /// Hits against the user-pair cache.
    pub collaborative_hits: AtomicU64,

    /// Misses against the user-pair cache.
    pub collaborative_misses: AtomicU64,

    /// Hits against the item-pair cache.
    pub content_hits: AtomicU64,

    /// Misses against the item-pair cache.
    pub content_misses: AtomicU64,

    /// Entries removed by eviction across both caches.
    pub evictions: AtomicU64,
}

impl EngineMetrics for CounterMetrics {
    fn item_upserted(&self) {
        self.items_upserted.fetch_add(1, Ordering::Relaxed);
    }

    fn user_upserted(&self) {
        self.users_upserted.fetch_add(1, Ordering::Relaxed);
    }

    fn ratings_dropped(&self, count: usize) {
        self.ratings_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn cache_lookup(&self, cache: &'static str, hit: bool) {
        let counter = match (cache, hit) {
            ("collaborative", true) => &self.collaborative_hits,
            ("collaborative", false) => &self.collaborative_misses,
            ("content", true) => &self.content_hits,
            ("content", false) => &self.content_misses,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn cache_evicted(&self, _cache: &'static str, removed: usize) {
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn EngineMetrics> {
    Arc::new(NoopMetrics)
}
