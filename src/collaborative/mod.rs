//! User-user collaborative filtering.
//!
//! Similarities come from the precomputed pair cache only; a pair that was
//! never precomputed (or was evicted) contributes nothing. Neighbour votes are
//! weighted by both similarity and the neighbour's influence rank.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::cache::{precompute_pairs, CacheStats, PrecomputeStats, SimilarityCache};
use crate::config::CollaborativeOptions;
use crate::error::Result;
use crate::graph::{BipartiteGraph, GraphState};
use crate::model::{rank_top_n, ItemId, Rating, Recommendation, UserId};
use crate::rank::RankEngine;
use crate::similarity::sparse_cosine;


const CACHE_NAME: &str = "collaborative";

/// Running `(weighted_sum, weight_sum)` per candidate item.
type Votes = FxHashMap<ItemId, (f64, f64)>;

/// Neighbourhood-based recommender over user rating vectors.
pub struct Collaborative {
    graph: Arc<BipartiteGraph>,
    ranks: Arc<RankEngine>,
    cache: SimilarityCache,
    options: CollaborativeOptions,
}

impl Collaborative {
    /// Creates the engine with an empty similarity cache.
    pub fn new(
        graph: Arc<BipartiteGraph>,
        ranks: Arc<RankEngine>,
        options: CollaborativeOptions,
    ) -> Self {
        let cache =
            SimilarityCache::with_metrics(CACHE_NAME, options.max_cache_entries, graph.metrics());
        Self {
            graph,
            ranks,
            cache,
            options,
        }
    }

    /// Cosine similarity of two users' rating vectors.
    ///
    /// 1.0 for the same id, 0.0 when either user is missing or they share no
    /// rated item.
    pub fn calculate_similarity(&self, a: UserId, b: UserId) -> f64 {
        if a == b {
            return 1.0;
        }
        let state = self.graph.read();
        Self::similarity_in(state.user_items(), a, b)
    }

    fn similarity_in(ratings: &FxHashMap<UserId, Vec<Rating>>, a: UserId, b: UserId) -> f64 {
        if a == b {
            return 1.0;
        }
        match (ratings.get(&a), ratings.get(&b)) {
            (Some(left), Some(right)) => sparse_cosine(left, right),
            _ => 0.0,
        }
    }

    /// Scores every user pair on `threads` workers and fills the cache.
    ///
    /// Works on a copy of the rating vectors, so the graph stays writable
    /// while the pass runs.
    pub fn precompute_similarities(&self, threads: usize) -> Result<PrecomputeStats> {
        let ratings = self.graph.read().user_items().clone();
        let mut ids: Vec<u32> = ratings.keys().map(|u| u.0).collect();
        ids.sort_unstable();
        precompute_pairs(&ids, threads, &self.cache, |a, b| {
            Self::similarity_in(&ratings, UserId(a), UserId(b))
        })
    }

    /// Cached similarity; 1.0 for the same id, 0.0 on a miss.
    pub fn get_cached_similarity(&self, a: UserId, b: UserId) -> f64 {
        if a == b {
            return 1.0;
        }
        self.cache.get(a.0, b.0).unwrap_or(0.0)
    }

    /// Top `n` unseen items for `user`, best first.
    ///
    /// Users without ratings get influence-weighted picks from highly ranked
    /// users, or the best-rated catalog items if too few users qualify.
    pub fn get_recommendations(&self, user: UserId, n: usize) -> Vec<Recommendation> {
        let (others, seen, has_ratings) = {
            let state = self.graph.read();
            let has_ratings = state
                .user_ratings(user)
                .is_some_and(|ratings| !ratings.is_empty());
            (state.user_ids(), state.rated_set(user), has_ratings)
        };

        // Cache and rank lookups run with the graph unlocked.
        if !has_ratings {
            let voters = self.influential_users(&others);
            let state = self.graph.read();
            let recs = Self::tally(&state, &voters, &seen, self.options.influence_weight, n);
            if !recs.is_empty() {
                debug!(user = %user, "collaborative.cold_start.influence");
                return recs;
            }
            debug!(user = %user, "collaborative.cold_start.quality_fallback");
            return quality_fallback(&state, n);
        }

        let voters: Vec<(UserId, f64)> = self
            .nearest_neighbours(&others, user)
            .into_iter()
            .map(|(other, similarity)| (other, similarity * self.ranks.get_page_rank(other)))
            .collect();
        let state = self.graph.read();
        Self::tally(&state, &voters, &seen, self.options.neighbor_weight, n)
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
    pub fn options(&self) -> &CollaborativeOptions {
        &self.options
    }

    fn nearest_neighbours(&self, others: &[UserId], user: UserId) -> Vec<(UserId, f64)> {
        let mut similar: Vec<(UserId, f64)> = others
            .iter()
            .copied()
            .filter(|&other| other != user)
            .map(|other| (other, self.get_cached_similarity(user, other)))
            .filter(|&(_, similarity)| similarity > 0.0)
            .collect();
        similar.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        similar.truncate(self.options.neighbors);
        similar
    }

    /// Users ranked at or above the influence threshold, weighted by rank.
    /// Empty when fewer than the configured minimum qualify.
    fn influential_users(&self, users: &[UserId]) -> Vec<(UserId, f64)> {
        let influential: Vec<(UserId, f64)> = users
            .iter()
            .map(|&u| (u, self.ranks.get_page_rank(u)))
            .filter(|&(_, rank)| rank >= self.options.min_influence_rank)
            .collect();
        if influential.len() < self.options.min_influential_users {
            return Vec::new();
        }
        influential
    }

    fn tally(
        state: &GraphState,
        voters: &[(UserId, f64)],
        seen: &FxHashSet<ItemId>,
        blend: f64,
        n: usize,
    ) -> Vec<Recommendation> {
        let mut votes = Votes::default();
        for &(voter, weight) in voters {
            Self::collect_votes(state, voter, weight, seen, &mut votes);
        }
        Self::finish(state, votes, blend, n)
    }

    fn collect_votes(
        state: &GraphState,
        voter: UserId,
        weight: f64,
        seen: &FxHashSet<ItemId>,
        votes: &mut Votes,
    ) {
        let Some(ratings) = state.user_ratings(voter) else {
            return;
        };
        for rating in ratings {
            if seen.contains(&rating.item) || !state.contains_item(rating.item) {
                continue;
            }
            let entry = votes.entry(rating.item).or_insert((0.0, 0.0));
            entry.0 += f64::from(rating.value) * weight;
            entry.1 += weight;
        }
    }

    /// Turns votes into weighted averages blended with item quality.
    fn finish(state: &GraphState, votes: Votes, blend: f64, n: usize) -> Vec<Recommendation> {
        let recs = votes
            .into_iter()
            .filter(|&(_, (_, weight))| weight > 0.0)
            .filter_map(|(item, (sum, weight))| {
                let quality = f64::from(state.item(item)?.quality);
                let score = blend * (sum / weight) + (1.0 - blend) * quality;
                Some(Recommendation::new(item, score))
            })
            .collect();
        rank_top_n(recs, n)
    }
}

/// Catalog items by descending quality score.
pub(crate) fn quality_fallback(state: &GraphState, n: usize) -> Vec<Recommendation> {
    let recs = state
        .items()
        .values()
        .map(|item| Recommendation::new(item.id, f64::from(item.quality)))
        .collect();
    rank_top_n(recs, n)
}
