//! Rank-weighted blend of collaborative and content scores.
//!
//! Blended scores are memoised per `(user, item)` for the life of the blender
//! and never evicted. The graph guard is only held for graph reads; rank,
//! collaborative and score-cache lookups happen outside it.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::collaborative::Collaborative;
use crate::config::HybridOptions;
use crate::content::Content;
use crate::error::{RecError, Result};
use crate::graph::{BipartiteGraph, GraphState};
use crate::model::{rank_top_n, ItemId, Rating, Recommendation, UserId};
use crate::rank::RankEngine;


fn score_key(user: UserId, item: ItemId) -> u64 {
    (u64::from(user.0) << 32) | u64::from(item.0)
}

/// Blends both recommenders, leaning toward collaborative scores for
/// influential users.
pub struct Hybrid {
    graph: Arc<BipartiteGraph>,
    collaborative: Arc<Collaborative>,
    content: Arc<Content>,
    ranks: Arc<RankEngine>,
    scores: Mutex<FxHashMap<u64, f64>>,
    options: HybridOptions,
}

impl Hybrid {
    /// Creates a blender over already constructed engines.
    pub fn new(
        graph: Arc<BipartiteGraph>,
        collaborative: Arc<Collaborative>,
        content: Arc<Content>,
        ranks: Arc<RankEngine>,
        options: HybridOptions,
    ) -> Self {
        Self {
            graph,
            collaborative,
            content,
            ranks,
            scores: Mutex::new(FxHashMap::default()),
            options,
        }
    }

    /// Blended score of `item` for `user`.
    ///
    /// Fails with [`RecError::UserNotFound`] when the user is not in the graph.
    pub fn calculate_hybrid_score(&self, user: UserId, item: ItemId) -> Result<f64> {
        if let Some(score) = self.cached(user, item) {
            return Ok(score);
        }
        let ratings = self.ratings_of(user)?;
        let collaborative = self.collaborative.recommend(user);
        let rank = self.user_rank(user);

        let score = {
            let state = self.graph.read();
            self.blend(&state, item, &ratings, &collaborative, rank)
        };
        self.scores.lock().insert(score_key(user, item), score);
        Ok(score)
    }

    /// Top `n` unrated items for `user` by blended score.
    ///
    /// Fails with [`RecError::UserNotFound`] when the user is not in the graph.
    pub fn get_recommendations(&self, user: UserId, n: usize) -> Result<Vec<Recommendation>> {
        let ratings = self.ratings_of(user)?;
        let candidates: Vec<ItemId> = {
            let state = self.graph.read();
            let seen = state.rated_set(user);
            state
                .item_ids()
                .into_iter()
                .filter(|item| !seen.contains(item))
                .collect()
        };

        // Computed once and reused for every candidate.
        let collaborative = self.collaborative.recommend(user);
        let rank = self.user_rank(user);

        let mut recs = Vec::with_capacity(candidates.len());
        let mut missing = Vec::new();
        {
            let scores = self.scores.lock();
            for item in candidates {
                match scores.get(&score_key(user, item)) {
                    Some(&score) => recs.push(Recommendation::new(item, score)),
                    None => missing.push(item),
                }
            }
        }

        if !missing.is_empty() {
            let fresh: Vec<Recommendation> = {
                let state = self.graph.read();
                missing
                    .into_iter()
                    .map(|item| {
                        let score = self.blend(&state, item, &ratings, &collaborative, rank);
                        Recommendation::new(item, score)
                    })
                    .collect()
            };
            debug!(user = %user, computed = fresh.len(), "hybrid.scores.cached");
            self.scores
                .lock()
                .extend(fresh.iter().map(|rec| (score_key(user, rec.item), rec.score)));
            recs.extend(fresh);
        }
        Ok(rank_top_n(recs, n))
    }

    /// [`Self::get_recommendations`] with the configured default length.
    pub fn recommend(&self, user: UserId) -> Result<Vec<Recommendation>> {
        self.get_recommendations(user, self.options.default_n)
    }

    /// Influence rank used to weight `user`'s collaborative share.
    pub fn user_rank(&self, user: UserId) -> f64 {
        self.ranks.get_page_rank(user)
    }

    /// Number of memoised `(user, item)` scores.
    pub fn cache_len(&self) -> usize {
        self.scores.lock().len()
    }

    /// Parameters this blender runs with.
    pub fn options(&self) -> &HybridOptions {
        &self.options
    }

    fn cached(&self, user: UserId, item: ItemId) -> Option<f64> {
        self.scores.lock().get(&score_key(user, item)).copied()
    }

    fn ratings_of(&self, user: UserId) -> Result<Vec<Rating>> {
        self.graph
            .user_ratings(user)
            .ok_or(RecError::UserNotFound(user))
    }

    fn blend(
        &self,
        state: &GraphState,
        item: ItemId,
        ratings: &[Rating],
        collaborative: &[Recommendation],
        rank: f64,
    ) -> f64 {
        let collab_score = collaborative
            .iter()
            .find(|rec| rec.item == item)
            .map_or(0.0, |rec| rec.score);

        let (weighted, total) = ratings.iter().fold((0.0, 0.0), |(weighted, total), rating| {
            let value = f64::from(rating.value);
            let similarity = self.content.similarity_in(state, rating.item, item);
            (weighted + similarity * value, total + value)
        });
        let content_score = if total > 0.0 { weighted / total } else { 0.0 };

        let collab_weight = self.options.collaborative_weight * (1.0 + rank);
        let content_weight = self.options.content_weight;
        let sum = collab_weight + content_weight;
        if sum <= 0.0 {
            return 0.0;
        }
        (collab_weight * collab_score + content_weight * content_score) / sum
    }
}
