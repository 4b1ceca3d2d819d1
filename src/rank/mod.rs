//! User influence ranking.
//!
//! A PageRank-style propagation over the implicit user-user graph whose edge
//! weights are shared-item counts. Influence flowing into a user is scaled by
//! an activity multiplier so heavy raters dominate the ranking. The snapshot
//! is computed eagerly and frozen; [`RankEngine::recompute`] rebuilds it as a
//! full batch.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::config::RankOptions;
use crate::graph::{BipartiteGraph, GraphState};
use crate::model::UserId;


/// Summary of the last ranking batch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RankStats {
    /// Users ranked.
    pub users: usize,
    /// Propagation rounds executed.
    pub iterations: usize,
    /// Whether the change fell below the threshold before the budget ran out.
    ///
    /// The change compares each round's raw scores with the previous round's
    /// normalized ranks, so graphs where damping leaves most mass unassigned
    /// run the full budget.
    pub converged: bool,
    /// Summed absolute difference between the final round's raw scores and
    /// the ranks it started from.
    pub final_delta: f64,
}

#[derive(Default)]
struct RankSnapshot {
    ranks: FxHashMap<UserId, f64>,
    stats: RankStats,
}

/// Computes and serves per-user influence scores.
pub struct RankEngine {
    graph: Arc<BipartiteGraph>,
    options: RankOptions,
    snapshot: RwLock<RankSnapshot>,
}

impl RankEngine {
    /// Builds the engine and ranks the current graph.
    pub fn new(graph: Arc<BipartiteGraph>, options: RankOptions) -> Self {
        let engine = Self {
            graph,
            options,
            snapshot: RwLock::new(RankSnapshot::default()),
        };
        engine.recompute();
        engine
    }

    /// Re-ranks the graph from scratch and replaces the snapshot.
    pub fn recompute(&self) -> RankStats {
        let started = Instant::now();
        let (ranks, stats) = {
            let state = self.graph.read();
            compute_ranks(&state, &self.options)
        };
        *self.snapshot.write() = RankSnapshot { ranks, stats };

        if stats.users > 0 {
            info!(
                users = stats.users,
                iterations = stats.iterations,
                converged = stats.converged,
                final_delta = stats.final_delta,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "rank.compute.done"
            );
        } else {
            debug!("rank.compute.empty_graph");
        }
        stats
    }

    /// Influence of `user`, or the rank floor when the user is unknown.
    pub fn get_page_rank(&self, user: UserId) -> f64 {
        self.snapshot
            .read()
            .ranks
            .get(&user)
            .copied()
            .unwrap_or(self.options.min_rank)
    }

    /// All ranks ordered by user id.
    pub fn ranks(&self) -> Vec<(UserId, f64)> {
        let snapshot = self.snapshot.read();
        let mut ranks: Vec<(UserId, f64)> =
            snapshot.ranks.iter().map(|(&u, &r)| (u, r)).collect();
        ranks.sort_by_key(|&(u, _)| u);
        ranks
    }

    /// Statistics of the last batch.
    pub fn stats(&self) -> RankStats {
        self.snapshot.read().stats
    }

    /// Parameters this engine ranks with.
    pub fn options(&self) -> &RankOptions {
        &self.options
    }
}

/// Multiplier applied to influence flowing into a user with `num_ratings`.
///
/// Users at or above the core threshold get the flat boost; below it a
/// logistic ramp centred on the threshold rises from 1.0 toward the boost.
pub fn activity_score(options: &RankOptions, num_ratings: usize, max_ratings: usize) -> f64 {
    if max_ratings == 0 {
        return 1.0;
    }
    let ratio = num_ratings as f64 / max_ratings as f64;
    if ratio >= options.core_activity_threshold {
        options.activity_boost
    } else {
        let ramp = 1.0 / (1.0 + (-10.0 * (ratio - options.core_activity_threshold)).exp());
        1.0 + (options.activity_boost - 1.0) * ramp
    }
}

/// Shared-item counts between every pair of users that overlap at all.
///
/// Built from the item-to-users direction, which yields the same counts as an
/// all-pairs scan of the user-to-items direction.
fn overlap_lists(state: &GraphState, index: &FxHashMap<UserId, usize>) -> Vec<Vec<(usize, u32)>> {
    let mut counts: Vec<FxHashMap<usize, u32>> = vec![FxHashMap::default(); index.len()];
    for raters in state.item_users().values() {
        for (p, (left, _)) in raters.iter().enumerate() {
            let Some(&li) = index.get(left) else { continue };
            for (right, _) in &raters[p + 1..] {
                let Some(&ri) = index.get(right) else { continue };
                if li == ri {
                    continue;
                }
                *counts[li].entry(ri).or_insert(0) += 1;
                *counts[ri].entry(li).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .map(|m| {
            let mut list: Vec<(usize, u32)> = m.into_iter().collect();
            list.sort_unstable_by_key(|&(o, _)| o);
            list
        })
        .collect()
}

fn compute_ranks(state: &GraphState, options: &RankOptions) -> (FxHashMap<UserId, f64>, RankStats) {
    let users = state.user_ids();
    if users.is_empty() || state.items().is_empty() {
        return (FxHashMap::default(), RankStats::default());
    }

    let n = users.len();
    let index: FxHashMap<UserId, usize> = users.iter().enumerate().map(|(i, &u)| (u, i)).collect();
    let degree: Vec<usize> = users
        .iter()
        .map(|&u| state.user_ratings(u).map_or(0, <[_]>::len))
        .collect();
    let max_ratings = degree.iter().copied().max().unwrap_or(0);
    let activity: Vec<f64> = degree
        .iter()
        .map(|&d| activity_score(options, d, max_ratings))
        .collect();
    let overlap = overlap_lists(state, &index);

    let base = (1.0 - options.damping) / n as f64;
    let mut ranks = vec![1.0 / n as f64; n];
    let mut stats = RankStats {
        users: n,
        ..RankStats::default()
    };

    for round in 0..options.max_iterations {
        let mut next: Vec<f64> = (0..n)
            .map(|i| {
                let inflow: f64 = overlap[i]
                    .iter()
                    .map(|&(o, shared)| ranks[o] * f64::from(shared) / degree[o] as f64)
                    .sum();
                base + options.damping * activity[i] * inflow
            })
            .collect();

        // Change is taken before normalization, against the previous
        // normalized ranks.
        let delta: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();

        let total: f64 = next.iter().sum();
        if total > 0.0 {
            for rank in &mut next {
                *rank = (*rank / total).max(options.min_rank);
            }
        }
        ranks = next;
        stats.iterations = round + 1;
        stats.final_delta = delta;
        if delta < options.convergence_threshold {
            stats.converged = true;
            break;
        }
    }

    if !stats.converged {
        warn!(
            users = n,
            iterations = stats.iterations,
            final_delta = stats.final_delta,
            "rank.compute.not_converged"
        );
    }

    let ranks = users.into_iter().zip(ranks).collect();
    (ranks, stats)
}
