use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use super::SimilarityCache;
use crate::error::{RecError, Result};

/// Outcome of one precompute pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PrecomputeStats {
    /// Unordered pairs scored.
    pub pairs: usize,
    /// Pairs with a positive score written to the cache.
    pub stored: usize,
    /// Entries dropped by the eviction pass that followed.
    pub evicted: usize,
    /// Non-empty pair slices the pass was split into.
    pub workers: usize,
}

/// Walks the upper triangle `(i, j), i < j` of an `n x n` index grid starting
/// at a linear pair offset.
struct PairCursor {
    n: usize,
    i: usize,
    j: usize,
}

impl PairCursor {
    fn at(n: usize, mut offset: usize) -> Self {
        let mut i = 0;
        while i + 1 < n {
            let row = n - 1 - i;
            if offset < row {
                break;
            }
            offset -= row;
            i += 1;
        }
        Self {
            n,
            i,
            j: i + 1 + offset,
        }
    }
}

impl Iterator for PairCursor {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i + 1 >= self.n {
            return None;
        }
        let pair = (self.i, self.j);
        self.j += 1;
        if self.j >= self.n {
            self.i += 1;
            self.j = self.i + 1;
        }
        Some(pair)
    }
}

/// Scores every unordered pair of `ids` on `threads` workers and stores the
/// positive scores in `cache`.
///
/// The pair sequence is split into `threads` contiguous slices, run on a pool
/// with one thread per non-empty slice that lives for the duration of the call. Inserts take
/// the cache lock one pair at a time. Once every worker has finished the cache
/// is trimmed if it grew past capacity.
pub fn precompute_pairs<F>(
    ids: &[u32],
    threads: usize,
    cache: &SimilarityCache,
    score: F,
) -> Result<PrecomputeStats>
where
    F: Fn(u32, u32) -> f64 + Sync,
{
    if threads == 0 {
        return Err(RecError::InvalidArgument(
            "precompute needs at least one thread".into(),
        ));
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let n = ids.len();
    let total = n * n.saturating_sub(1) / 2;
    if total == 0 {
        return Ok(PrecomputeStats::default());
    }

    let started = Instant::now();
    let per_worker = total.div_ceil(threads);
    let slices: Vec<(usize, usize)> = (0..threads)
        .map(|w| (w * per_worker, ((w + 1) * per_worker).min(total)))
        .filter(|(start, end)| start < end)
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(slices.len())
        .thread_name(|idx| format!("cinegraph-precompute-{idx}"))
        .build()?;

    let stored = AtomicUsize::new(0);
    pool.install(|| {
        slices.par_iter().for_each(|&(start, end)| {
            for (i, j) in PairCursor::at(n, start).take(end - start) {
                let (a, b) = (ids[i], ids[j]);
                let similarity = score(a, b);
                if similarity > 0.0 {
                    cache.insert(a, b, similarity);
                    stored.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    });

    let evicted = cache.evict_if_needed();
    let stats = PrecomputeStats {
        pairs: total,
        stored: stored.into_inner(),
        evicted,
        workers: slices.len(),
    };
    info!(
        cache = cache.name,
        pairs = stats.pairs,
        stored = stats.stored,
        evicted = stats.evicted,
        workers = stats.workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "cache.precompute.done"
    );
    Ok(stats)
}
