//! Wires the engines together in data-flow order.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::cache::PrecomputeStats;
use crate::collaborative::Collaborative;
use crate::config::EngineConfig;
use crate::content::Content;
use crate::error::Result;
use crate::graph::BipartiteGraph;
use crate::hybrid::Hybrid;
use crate::rank::RankEngine;

/// A fully built recommender: ranks computed, both similarity caches filled.
pub struct RecommendationEngine {
    graph: Arc<BipartiteGraph>,
    ranks: Arc<RankEngine>,
    collaborative: Arc<Collaborative>,
    content: Arc<Content>,
    hybrid: Hybrid,
    precompute: [PrecomputeStats; 2],
}

impl RecommendationEngine {
    /// Ranks users, precomputes both caches and assembles the blender.
    ///
    /// The graph should be fully loaded first; later changes are not seen by
    /// the rank snapshot or the caches.
    pub fn build(graph: Arc<BipartiteGraph>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        let threads = config.resolved_threads();

        let ranks = Arc::new(RankEngine::new(Arc::clone(&graph), config.rank));
        let collaborative = Arc::new(Collaborative::new(
            Arc::clone(&graph),
            Arc::clone(&ranks),
            config.collaborative,
        ));
        let content = Arc::new(Content::new(Arc::clone(&graph), config.content));

        let users = collaborative.precompute_similarities(threads)?;
        let items = content.precompute_similarities(threads)?;

        let hybrid = Hybrid::new(
            Arc::clone(&graph),
            Arc::clone(&collaborative),
            Arc::clone(&content),
            Arc::clone(&ranks),
            config.hybrid,
        );

        info!(
            users = graph.user_count(),
            items = graph.item_count(),
            threads,
            user_pairs = users.stored,
            item_pairs = items.stored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "engine.build.done"
        );

        Ok(Self {
            graph,
            ranks,
            collaborative,
            content,
            hybrid,
            precompute: [users, items],
        })
    }

    /// Underlying rating graph.
    pub fn graph(&self) -> &Arc<BipartiteGraph> {
        &self.graph
    }

    /// Influence ranking.
    pub fn ranks(&self) -> &Arc<RankEngine> {
        &self.ranks
    }

    /// User-user recommender.
    pub fn collaborative(&self) -> &Arc<Collaborative> {
        &self.collaborative
    }

    /// Item-item recommender.
    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    /// Blended recommender.
    pub fn hybrid(&self) -> &Hybrid {
        &self.hybrid
    }

    /// Precompute summaries for the user and item caches, in that order.
    pub fn precompute_stats(&self) -> (PrecomputeStats, PrecomputeStats) {
        (self.precompute[0], self.precompute[1])
    }
}
