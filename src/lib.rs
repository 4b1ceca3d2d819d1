//! Cinegraph: a hybrid movie recommender over a user-item rating graph.
//!
//! The [`graph`] store holds items and ratings in both directions. [`rank`]
//! scores user influence, [`collaborative`] and [`content`] recommend from
//! precomputed similarity caches, and [`hybrid`] blends the two weighted by
//! influence. [`RecommendationEngine`] builds all of them in order.

#![warn(missing_docs)]

pub mod cache;
pub mod collaborative;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hybrid;
pub mod metrics;
pub mod model;
pub mod rank;
pub mod similarity;

pub use cache::{CacheStats, PrecomputeStats, SimilarityCache};
pub use collaborative::Collaborative;
pub use config::{CollaborativeOptions, ContentOptions, EngineConfig, HybridOptions, RankOptions};
pub use content::Content;
pub use engine::RecommendationEngine;
pub use error::{RecError, Result};
pub use graph::BipartiteGraph;
pub use hybrid::Hybrid;
pub use metrics::{CounterMetrics, EngineMetrics, NoopMetrics};
pub use model::{Item, ItemId, Rating, Recommendation, UserId, UserView};
pub use rank::{RankEngine, RankStats};
