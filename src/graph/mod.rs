//! Bipartite rating graph.
//!
//! Holds the item catalog and the user/item rating adjacency in both
//! directions. All state lives behind one reader-writer lock, so an
//! [`BipartiteGraph::add_user`] call publishes both directions at once and
//! readers never observe a half-applied update.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::metrics::{default_metrics, EngineMetrics};
use crate::model::{Item, ItemId, Rating, UserId, UserView};


/// Read guard over the graph state.
pub type GraphReadGuard<'a> = RwLockReadGuard<'a, GraphState>;

/// Item catalog plus bidirectional rating adjacency.
#[derive(Default, Debug)]
pub struct GraphState {
    items: FxHashMap<ItemId, Item>,
    user_items: FxHashMap<UserId, Vec<Rating>>,
    item_users: FxHashMap<ItemId, Vec<(UserId, f32)>>,
}

impl GraphState {
    /// Item catalog keyed by id.
    pub fn items(&self) -> &FxHashMap<ItemId, Item> {
        &self.items
    }

    /// User to rated-items direction of the adjacency.
    pub fn user_items(&self) -> &FxHashMap<UserId, Vec<Rating>> {
        &self.user_items
    }

    /// Item to rating-users direction of the adjacency.
    pub fn item_users(&self) -> &FxHashMap<ItemId, Vec<(UserId, f32)>> {
        &self.item_users
    }

    /// Looks up an item.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Ratings of `user`, or `None` when the user was never added.
    pub fn user_ratings(&self, user: UserId) -> Option<&[Rating]> {
        self.user_items.get(&user).map(Vec::as_slice)
    }

    /// Users that rated `item`, with their rating.
    pub fn item_raters(&self, item: ItemId) -> &[(UserId, f32)] {
        self.item_users.get(&item).map_or(&[][..], Vec::as_slice)
    }

    /// Returns true if `user` exists.
    pub fn contains_user(&self, user: UserId) -> bool {
        self.user_items.contains_key(&user)
    }

    /// Returns true if `item` exists.
    pub fn contains_item(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }

    /// All user ids in ascending order.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All item ids in ascending order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Set of items rated by `user`; empty for unknown users.
    pub fn rated_set(&self, user: UserId) -> FxHashSet<ItemId> {
        self.user_ratings(user)
            .map(|ratings| ratings.iter().map(|r| r.item).collect())
            .unwrap_or_default()
    }

    /// Total number of rating edges.
    pub fn edge_count(&self) -> usize {
        self.user_items.values().map(Vec::len).sum()
    }

    fn detach_user(&mut self, user: UserId, previous: &[Rating]) {
        for rating in previous {
            if let Some(raters) = self.item_users.get_mut(&rating.item) {
                raters.retain(|(id, _)| *id != user);
                if raters.is_empty() {
                    self.item_users.remove(&rating.item);
                }
            }
        }
    }
}

/// Shared rating graph; cheap to clone behind an [`Arc`].
pub struct BipartiteGraph {
    state: RwLock<GraphState>,
    metrics: Arc<dyn EngineMetrics>,
}

impl Default for BipartiteGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BipartiteGraph {
    /// Creates an empty graph with no-op metrics.
    pub fn new() -> Self {
        Self::with_metrics(default_metrics())
    }

    /// Creates an empty graph reporting to `metrics`.
    pub fn with_metrics(metrics: Arc<dyn EngineMetrics>) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            metrics,
        }
    }

    /// Metrics sink shared with the engines built on this graph.
    pub fn metrics(&self) -> Arc<dyn EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Acquires a read guard over the whole graph.
    ///
    /// Do not hold the guard across calls into other graph-reading APIs.
    pub fn read(&self) -> GraphReadGuard<'_> {
        self.state.read()
    }

    /// Inserts or replaces an item.
    pub fn add_item(
        &self,
        id: ItemId,
        genres: Vec<String>,
        length_minutes: u32,
        quality: f32,
        tier: u8,
    ) {
        self.insert_item(Item::new(id, genres, length_minutes, quality, tier));
    }

    /// Inserts or replaces an already-built item.
    pub fn insert_item(&self, item: Item) {
        self.state.write().items.insert(item.id, item);
        self.metrics.item_upserted();
    }

    /// Inserts `user` with `ratings`, replacing any previous rating set.
    ///
    /// Ratings for unknown items are dropped. A repeated item keeps its last
    /// rating.
    pub fn add_user<I, R>(&self, user: UserId, ratings: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<Rating>,
    {
        let mut dropped = 0usize;
        let mut state = self.state.write();

        let mut valid: Vec<Rating> = Vec::new();
        let mut slot: FxHashMap<ItemId, usize> = FxHashMap::default();
        for rating in ratings.into_iter().map(Into::into) {
            if !state.items.contains_key(&rating.item) {
                dropped += 1;
                continue;
            }
            match slot.get(&rating.item) {
                Some(&idx) => valid[idx].value = rating.value,
                None => {
                    slot.insert(rating.item, valid.len());
                    valid.push(rating);
                }
            }
        }

        if let Some(previous) = state.user_items.remove(&user) {
            state.detach_user(user, &previous);
        }
        for rating in &valid {
            state
                .item_users
                .entry(rating.item)
                .or_default()
                .push((user, rating.value));
        }
        state.user_items.insert(user, valid);
        drop(state);

        if dropped > 0 {
            debug!(user = %user, dropped, "graph.add_user.dropped_unknown_items");
            self.metrics.ratings_dropped(dropped);
        }
        self.metrics.user_upserted();
    }

    /// Reconstructs a per-user view, ordered by user id.
    pub fn all_users(&self) -> Vec<UserView> {
        let state = self.state.read();
        let mut users: Vec<UserView> = state
            .user_items
            .iter()
            .map(|(&id, ratings)| {
                let ratings: Vec<Rating> = ratings
                    .iter()
                    .filter(|r| state.items.contains_key(&r.item))
                    .copied()
                    .collect();
                let watched = ratings.iter().map(|r| (r.item, 1)).collect();
                UserView {
                    id,
                    ratings,
                    watched,
                }
            })
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }

    /// Clones the item with `id`.
    pub fn item(&self, id: ItemId) -> Option<Item> {
        self.state.read().items.get(&id).cloned()
    }

    /// Clones the ratings of `user`.
    pub fn user_ratings(&self, user: UserId) -> Option<Vec<Rating>> {
        self.state.read().user_items.get(&user).cloned()
    }

    /// Returns true if `user` exists.
    pub fn contains_user(&self, user: UserId) -> bool {
        self.state.read().contains_user(user)
    }

    /// Number of users.
    pub fn user_count(&self) -> usize {
        self.state.read().user_items.len()
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        self.state.read().items.len()
    }

    /// Number of rating edges.
    pub fn edge_count(&self) -> usize {
        self.state.read().edge_count()
    }
}
