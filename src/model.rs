//! Identifiers and value types shared across the engines.

use std::cmp::Ordering;
use std::fmt;

/// Identifier of a user node in the rating graph.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct UserId(pub u32);

/// Identifier of an item (movie) node in the rating graph.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct ItemId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UserId {
    fn from(value: u32) -> Self {
        UserId(value)
    }
}

impl From<u32> for ItemId {
    fn from(value: u32) -> Self {
        ItemId(value)
    }
}

/// Catalog entry for a movie.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Item identifier.
    pub id: ItemId,
    /// Genre labels attached to the item.
    pub genres: Vec<String>,
    /// Runtime in minutes.
    pub length_minutes: u32,
    /// Quality score on a 0-10 scale.
    pub quality: f32,
    /// Classification tier (G, PG, PG-13, R map to 0..=3).
    pub tier: u8,
}

impl Item {
    /// Creates an item from its raw attributes.
    pub fn new(
        id: ItemId,
        genres: Vec<String>,
        length_minutes: u32,
        quality: f32,
        tier: u8,
    ) -> Self {
        Self {
            id,
            genres,
            length_minutes,
            quality,
            tier,
        }
    }
}

/// A single rating edge between a user and an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    /// Rated item.
    pub item: ItemId,
    /// Rating value supplied by the user.
    pub value: f32,
}

impl Rating {
    /// Creates a rating edge.
    pub fn new(item: ItemId, value: f32) -> Self {
        Self { item, value }
    }

    /// Builds ratings from raw `(item, value)` pairs.
    pub fn from_pairs(pairs: &[(u32, f32)]) -> Vec<Rating> {
        pairs.iter().copied().map(Rating::from).collect()
    }
}

impl From<(u32, f32)> for Rating {
    fn from((item, value): (u32, f32)) -> Self {
        Rating::new(ItemId(item), value)
    }
}

/// Per-user view reconstructed from the adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct UserView {
    /// User identifier.
    pub id: UserId,
    /// Ratings in insertion order.
    pub ratings: Vec<Rating>,
    /// Watch counts per rated item. Every rated item counts as watched once.
    pub watched: Vec<(ItemId, u32)>,
}

/// A scored candidate returned by every recommender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    /// Recommended item.
    pub item: ItemId,
    /// Engine-specific score; higher is better.
    pub score: f64,
}

impl Recommendation {
    /// Creates a recommendation.
    pub fn new(item: ItemId, score: f64) -> Self {
        Self { item, score }
    }
}

/// Orders by descending score, breaking ties by ascending item id.
pub(crate) fn by_score_desc(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.item.cmp(&b.item))
}

/// Sorts `recs` best-first and keeps at most `n` entries.
pub(crate) fn rank_top_n(mut recs: Vec<Recommendation>, n: usize) -> Vec<Recommendation> {
    recs.sort_by(by_score_desc);
    recs.truncate(n);
    recs
}
