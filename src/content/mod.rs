//! Item-item content filtering.
//!
//! Item similarity mixes genre overlap with closeness of quality score,
//! classification tier and runtime. User recommendations come from genre
//! preferences learned from the user's own ratings.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cache::{precompute_pairs, CacheStats, PrecomputeStats, SimilarityCache};
use crate::collaborative::quality_fallback;
use crate::config::ContentOptions;
use crate::error::Result;
use crate::graph::{BipartiteGraph, GraphState};
use crate::model::{rank_top_n, Item, ItemId, Recommendation, UserId};
use crate::similarity::jaccard;


const CACHE_NAME: &str = "content";

/// Span of the quality scale.
const QUALITY_SPAN: f64 = 10.0;
/// Span of the classification tiers.
const TIER_SPAN: f64 = 4.0;
/// Runtime difference, in minutes, at which length similarity reaches zero.
const LENGTH_SPAN: f64 = 180.0;

/// Attribute-based recommender over the item catalog.
pub struct Content {
    graph: Arc<BipartiteGraph>,
    cache: SimilarityCache,
    options: ContentOptions,
}

impl Content {
    /// Creates the engine with an empty similarity cache.
    pub fn new(graph: Arc<BipartiteGraph>, options: ContentOptions) -> Self {
        let cache =
            SimilarityCache::with_metrics(CACHE_NAME, options.max_cache_entries, graph.metrics());
        Self {
            graph,
            cache,
            options,
        }
    }

    /// Attribute similarity of two items.
    ///
    /// 1.0 for the same id and 0.0 when either item is missing. The result is
    /// not clamped: items far apart on every axis can score below zero.
    pub fn calculate_similarity(&self, a: ItemId, b: ItemId) -> f64 {
        if a == b {
            return 1.0;
        }
        let state = self.graph.read();
        self.similarity_in(&state, a, b)
    }

    pub(crate) fn similarity_in(&self, state: &GraphState, a: ItemId, b: ItemId) -> f64 {
        self.similarity_among(state.items(), a, b)
    }

    fn similarity_among(&self, items: &FxHashMap<ItemId, Item>, a: ItemId, b: ItemId) -> f64 {
        if a == b {
            return 1.0;
        }
        match (items.get(&a), items.get(&b)) {
            (Some(left), Some(right)) => self.score_items(left, right),
            _ => 0.0,
        }
    }

    fn score_items(&self, left: &Item, right: &Item) -> f64 {
        let opts = &self.options;
        let genre = jaccard(&left.genres, &right.genres);
        let quality = 1.0 - (f64::from(left.quality) - f64::from(right.quality)).abs() / QUALITY_SPAN;
        let tier = 1.0 - (f64::from(left.tier) - f64::from(right.tier)).abs() / TIER_SPAN;
        let length = 1.0
            - (f64::from(left.length_minutes) - f64::from(right.length_minutes)).abs()
                / LENGTH_SPAN;

        opts.genre_weight * genre
            + opts.quality_weight * quality
            + opts.tier_weight * tier
            + opts.length_weight * length
    }

    /// Scores every item pair on `threads` workers and fills the cache.
    ///
    /// Works on a copy of the catalog, so the graph stays writable while the
    /// pass runs.
    pub fn precompute_similarities(&self, threads: usize) -> Result<PrecomputeStats> {
        let items = self.graph.read().items().clone();
        let mut ids: Vec<u32> = items.keys().map(|i| i.0).collect();
        ids.sort_unstable();
        precompute_pairs(&ids, threads, &self.cache, |a, b| {
            self.similarity_among(&items, ItemId(a), ItemId(b))
        })
    }

    /// Cached similarity; 1.0 for the same id, 0.0 on a miss.
    pub fn get_cached_similarity(&self, a: ItemId, b: ItemId) -> f64 {
        if a == b {
            return 1.0;
        }
        self.cache.get(a.0, b.0).unwrap_or(0.0)
    }

    /// Cached neighbours of `item` with a positive score, best first.
    pub fn similar_items(&self, item: ItemId, n: usize) -> Vec<Recommendation> {
        let candidates = {
            let state = self.graph.read();
            if !state.contains_item(item) {
                return Vec::new();
            }
            state.item_ids()
        };
        let recs = candidates
            .into_iter()
            .filter(|&other| other != item)
            .map(|other| Recommendation::new(other, self.get_cached_similarity(item, other)))
            .filter(|rec| rec.score > 0.0)
            .collect();
        rank_top_n(recs, n)
    }

    /// Top `n` unseen items for `user`, ranked by learned genre preference.
    ///
    /// Unknown users and users without ratings get the best-rated items.
    pub fn get_recommendations(&self, user: UserId, n: usize) -> Vec<Recommendation> {
        let state = self.graph.read();
        let ratings = match state.user_ratings(user) {
            Some(ratings) if !ratings.is_empty() => ratings,
            _ => {
                debug!(user = %user, "content.cold_start.quality_fallback");
                return quality_fallback(&state, n);
            }
        };

        let seen = state.rated_set(user);
        let preferences = genre_preferences(&state, ratings.iter().map(|r| (r.item, r.value)));
        let blend = self.options.preference_weight;

        let recs = state
            .items()
            .values()
            .filter(|item| !seen.contains(&item.id))
            .map(|item| {
                let (sum, count) = item
                    .genres
                    .iter()
                    .filter_map(|genre| preferences.get(genre.as_str()))
                    .fold((0.0, 0usize), |(sum, count), pref| (sum + pref, count + 1));
                let genre_score = if count > 0 { sum / count as f64 } else { 0.0 };
                let score = blend * genre_score
                    + (1.0 - blend) * (f64::from(item.quality) / QUALITY_SPAN);
                Recommendation::new(item.id, score)
            })
            .collect();
        rank_top_n(recs, n)
    }

    /// [`Self::get_recommendations`] with the configured default length.
    pub fn recommend(&self, user: UserId) -> Vec<Recommendation> {
        self.get_recommendations(user, self.options.default_n)
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Backing similarity cache.
    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    /// Parameters this engine runs with.
    pub fn options(&self) -> &ContentOptions {
        &self.options
    }
}

/// Per-genre preference: average rating times the square root of the rating
/// count, scaled so the strongest genre is 1.0.
fn genre_preferences<'a, I>(state: &'a GraphState, ratings: I) -> FxHashMap<&'a str, f64>
where
    I: IntoIterator<Item = (ItemId, f32)>,
{
    let mut totals: FxHashMap<&'a str, (f64, usize)> = FxHashMap::default();
    for (item, value) in ratings {
        let Some(item) = state.item(item) else {
            continue;
        };
        for genre in &item.genres {
            let entry = totals.entry(genre.as_str()).or_insert((0.0, 0));
            entry.0 += f64::from(value);
            entry.1 += 1;
        }
    }

    let mut preferences: FxHashMap<&'a str, f64> = totals
        .into_iter()
        .map(|(genre, (sum, count))| (genre, (sum / count as f64) * (count as f64).sqrt()))
        .collect();
    let max = preferences.values().copied().fold(0.0, f64::max);
    if max > 0.0 {
        for preference in preferences.values_mut() {
            *preference /= max;
        }
    }
    preferences
}
