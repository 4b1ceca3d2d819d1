//! Engine configuration.
//!
//! Every section carries the tuned defaults in its [`Default`] impl, so an
//! empty TOML document yields the stock engine. Sections can be overridden
//! wholesale or field by field:
//!
//! ```toml
//! precompute_threads = 4
//!
//! [rank]
//! damping = 0.9
//!
//! [collaborative]
//! neighbors = 20
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RecError, Result};

/// Default capacity of each similarity cache before eviction kicks in.
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 10_000;

/// Parameters of the influence ranking pass.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankOptions {
    /// Damping factor applied to propagated influence.
    pub damping: f64,
    /// Upper bound on propagation rounds.
    pub max_iterations: usize,
    /// Summed absolute rank change below which iteration stops.
    pub convergence_threshold: f64,
    /// Floor applied to every normalized rank; also the rank of unknown users.
    pub min_rank: f64,
    /// Activity ratio at which a user receives the flat boost.
    pub core_activity_threshold: f64,
    /// Multiplier for core users; the logistic ramp approaches it from 1.0.
    pub activity_boost: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 50,
            convergence_threshold: 1e-4,
            min_rank: 1e-4,
            core_activity_threshold: 0.5,
            activity_boost: 3.0,
        }
    }
}

impl RankOptions {
    /// Sets the damping factor.
    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Sets the iteration budget.
    pub fn max_iterations(mut self, rounds: usize) -> Self {
        self.max_iterations = rounds;
        self
    }

    /// Sets the convergence threshold.
    pub fn convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }
}

/// Parameters of the user-user collaborative engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollaborativeOptions {
    /// Similarity cache capacity.
    pub max_cache_entries: usize,
    /// Number of most similar users consulted per query.
    pub neighbors: usize,
    /// Minimum rank for a user to count as influential.
    pub min_influence_rank: f64,
    /// Minimum number of influential users for cold-start recommendations.
    pub min_influential_users: usize,
    /// Share of the neighbour score in the final blend; quality gets the rest.
    pub neighbor_weight: f64,
    /// Share of the influence score in the cold-start blend; quality gets the rest.
    pub influence_weight: f64,
    /// List length used when callers do not pass one.
    pub default_n: usize,
}

impl Default for CollaborativeOptions {
    fn default() -> Self {
        Self {
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            neighbors: 10,
            min_influence_rank: 0.01,
            min_influential_users: 5,
            neighbor_weight: 0.8,
            influence_weight: 0.7,
            default_n: 5,
        }
    }
}

impl CollaborativeOptions {
    /// Sets the similarity cache capacity.
    pub fn max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }

    /// Sets the neighbourhood size.
    pub fn neighbors(mut self, k: usize) -> Self {
        self.neighbors = k;
        self
    }
}

/// Parameters of the item-item content engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentOptions {
    /// Similarity cache capacity.
    pub max_cache_entries: usize,
    /// Weight of genre Jaccard overlap.
    pub genre_weight: f64,
    /// Weight of quality-score closeness.
    pub quality_weight: f64,
    /// Weight of classification-tier closeness.
    pub tier_weight: f64,
    /// Weight of runtime closeness.
    pub length_weight: f64,
    /// Share of genre preference in the final blend; quality gets the rest.
    pub preference_weight: f64,
    /// List length used when callers do not pass one.
    pub default_n: usize,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            genre_weight: 0.6,
            quality_weight: 0.2,
            tier_weight: 0.1,
            length_weight: 0.1,
            preference_weight: 0.8,
            default_n: 10,
        }
    }
}

impl ContentOptions {
    /// Sets the similarity cache capacity.
    pub fn max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }
}

/// Parameters of the hybrid blender.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridOptions {
    /// Base collaborative weight, boosted by `1 + rank(user)`.
    pub collaborative_weight: f64,
    /// Base content weight.
    pub content_weight: f64,
    /// List length used when callers do not pass one.
    pub default_n: usize,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            collaborative_weight: 0.6,
            content_weight: 0.4,
            default_n: 10,
        }
    }
}

/// Top-level configuration consumed by [`crate::RecommendationEngine`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Influence ranking parameters.
    pub rank: RankOptions,
    /// Collaborative engine parameters.
    pub collaborative: CollaborativeOptions,
    /// Content engine parameters.
    pub content: ContentOptions,
    /// Hybrid blender parameters.
    pub hybrid: HybridOptions,
    /// Worker count for similarity precompute; `None` uses available parallelism.
    pub precompute_threads: Option<usize>,
}

impl EngineConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let src = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&src)
    }

    /// Sets the precompute worker count.
    pub fn precompute_threads(mut self, threads: usize) -> Self {
        self.precompute_threads = Some(threads);
        self
    }

    /// Resolves the worker count, falling back to the host's parallelism.
    pub fn resolved_threads(&self) -> usize {
        self.precompute_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Rejects values that would make scoring meaningless.
    pub fn validate(&self) -> Result<()> {
        let rank = &self.rank;
        if !(rank.damping > 0.0 && rank.damping < 1.0) {
            return Err(invalid(format!(
                "rank.damping must be in (0, 1), got {}",
                rank.damping
            )));
        }
        if rank.min_rank <= 0.0 || rank.min_rank >= 1.0 {
            return Err(invalid(format!(
                "rank.min_rank must be in (0, 1), got {}",
                rank.min_rank
            )));
        }
        if rank.activity_boost < 1.0 {
            return Err(invalid("rank.activity_boost must be >= 1".into()));
        }
        if self.precompute_threads == Some(0) {
            return Err(invalid("precompute_threads must be positive".into()));
        }
        let weights = [
            ("collaborative.neighbor_weight", self.collaborative.neighbor_weight),
            ("collaborative.influence_weight", self.collaborative.influence_weight),
            ("content.genre_weight", self.content.genre_weight),
            ("content.quality_weight", self.content.quality_weight),
            ("content.tier_weight", self.content.tier_weight),
            ("content.length_weight", self.content.length_weight),
            ("content.preference_weight", self.content.preference_weight),
            ("hybrid.collaborative_weight", self.hybrid.collaborative_weight),
            ("hybrid.content_weight", self.hybrid.content_weight),
        ];
        for (name, value) in weights {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        if self.hybrid.collaborative_weight + self.hybrid.content_weight <= 0.0 {
            return Err(invalid("hybrid weights must not both be zero".into()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> RecError {
    RecError::InvalidArgument(msg)
}
