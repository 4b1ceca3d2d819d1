use std::sync::{Arc, Barrier};
use std::thread;

use cinegraph::{
    BipartiteGraph, EngineConfig, ItemId, Rating, RecommendationEngine, Result, SimilarityCache,
    UserId,
};

const NUM_THREADS: usize = 8;
const PAIRS_PER_THREAD: u32 = 200;

fn pair_for(thread_id: u32, i: u32) -> (u32, u32) {
    let base = thread_id * 10_000 + i * 2;
    (base + 1, base)
}

#[test]
fn concurrent_inserts_and_lookups_are_not_lost() {
    let cache = Arc::new(SimilarityCache::new("collaborative", 100_000));
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS as u32 {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..PAIRS_PER_THREAD {
                let (a, b) = pair_for(thread_id, i);
                cache.insert(a, b, f64::from(i + 1) / 1000.0);
            }
            let mut hits = 0;
            for i in 0..PAIRS_PER_THREAD {
                let (a, b) = pair_for(thread_id, i);
                if cache.get(b, a) == Some(f64::from(i + 1) / 1000.0) {
                    hits += 1;
                }
            }
            hits
        }));
    }

    let hits: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let expected = NUM_THREADS as u32 * PAIRS_PER_THREAD;
    assert_eq!(hits, expected);
    assert_eq!(cache.len(), expected as usize);

    let stats = cache.stats();
    assert_eq!(stats.hits, u64::from(expected));
    assert_eq!(stats.misses, 0);
}

#[test]
fn eviction_racing_with_lookups_keeps_the_bound() {
    let capacity = 400;
    let cache = Arc::new(SimilarityCache::new("content", capacity));
    for thread_id in 0..NUM_THREADS as u32 {
        for i in 0..PAIRS_PER_THREAD {
            let (a, b) = pair_for(thread_id, i);
            cache.insert(a, b, 0.5);
        }
    }
    assert_eq!(cache.len(), 1_600);

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];
    for thread_id in 0..NUM_THREADS as u32 {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..PAIRS_PER_THREAD / 4 {
                let (a, b) = pair_for(thread_id, i);
                let _ = cache.get(a, b);
            }
            cache.evict_if_needed()
        }));
    }

    let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(removed, 1_600 - capacity / 2);
    assert_eq!(cache.len(), capacity / 2);
    assert_eq!(cache.stats().evictions, removed as u64);
}

#[test]
fn precompute_is_independent_of_worker_count() -> Result<()> {
    let engines: Vec<RecommendationEngine> = [1, 3, 8]
        .into_iter()
        .map(|threads| {
            let graph = Arc::new(BipartiteGraph::new());
            populate(&graph);
            RecommendationEngine::build(graph, EngineConfig::default().precompute_threads(threads))
        })
        .collect::<Result<_>>()?;

    let baseline = &engines[0];
    for engine in &engines[1..] {
        assert_eq!(
            engine.collaborative().cache().len(),
            baseline.collaborative().cache().len()
        );
        for a in 0..20 {
            for b in 0..20 {
                assert_eq!(
                    engine.collaborative().get_cached_similarity(UserId(a), UserId(b)),
                    baseline.collaborative().get_cached_similarity(UserId(a), UserId(b))
                );
            }
        }
    }
    Ok(())
}

#[test]
fn shared_engine_serves_parallel_readers() -> Result<()> {
    let graph = Arc::new(BipartiteGraph::new());
    populate(&graph);
    let engine = Arc::new(RecommendationEngine::build(
        graph,
        EngineConfig::default().precompute_threads(4),
    )?);
    let expected = engine.hybrid().get_recommendations(UserId(3), 5)?;

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];
    for thread_id in 0..NUM_THREADS as u32 {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<_> {
            barrier.wait();
            let user = UserId(thread_id % 20);
            let hybrid = engine.hybrid().get_recommendations(user, 5)?;
            let mine = engine.hybrid().get_recommendations(UserId(3), 5)?;
            let collaborative = engine.collaborative().recommend(user);
            let content = engine.content().recommend(user);
            Ok((hybrid.len(), mine, collaborative.len(), content.len()))
        }));
    }

    for handle in handles {
        let (hybrid, mine, collaborative, content) = handle.join().unwrap()?;
        assert!(hybrid <= 5);
        assert_eq!(mine, expected);
        assert!(collaborative <= 5);
        assert!(content <= 10);
    }
    Ok(())
}

/// Twenty users over thirty items, each rating a sliding window of the
/// catalog.
fn populate(graph: &BipartiteGraph) {
    let labels = ["Action", "Drama", "Comedy", "Horror", "Romance"];
    for id in 0..30u32 {
        let genres = vec![
            labels[id as usize % labels.len()].to_string(),
            labels[(id as usize + 2) % labels.len()].to_string(),
        ];
        graph.add_item(ItemId(id), genres, 90 + id * 2, 5.0 + (id % 5) as f32, (id % 4) as u8);
    }
    for user in 0..20u32 {
        let ratings: Vec<Rating> = (0..6)
            .map(|k| Rating::new(ItemId((user + k * 3) % 30), 1.0 + ((user + k) % 5) as f32))
            .collect();
        graph.add_user(UserId(user), ratings);
    }
}
