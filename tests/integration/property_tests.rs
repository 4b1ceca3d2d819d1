use std::collections::BTreeMap;
use std::sync::Arc;

use cinegraph::{
    BipartiteGraph, Collaborative, CollaborativeOptions, Content, ContentOptions, ItemId, Rating,
    RankEngine, RankOptions, Recommendation, UserId,
};
use proptest::prelude::*;

const GENRES: [&str; 6] = ["Action", "Drama", "Comedy", "Horror", "Romance", "SciFi"];

#[derive(Debug, Clone)]
struct ItemSpec {
    genres: Vec<usize>,
    length: u32,
    quality: f32,
    tier: u8,
}

fn arb_item() -> impl Strategy<Value = ItemSpec> {
    (
        prop::collection::vec(0..GENRES.len(), 0..=3),
        60u32..=200,
        0u32..=100,
        0u8..=3,
    )
        .prop_map(|(genres, length, quality, tier)| ItemSpec {
            genres,
            length,
            quality: quality as f32 / 10.0,
            tier,
        })
}

fn arb_ratings(items: u32) -> impl Strategy<Value = BTreeMap<u32, f32>> {
    prop::collection::btree_map(0..items, (2u32..=10).prop_map(|v| v as f32 / 2.0), 0..=6)
}

fn arb_world() -> impl Strategy<Value = (Vec<ItemSpec>, Vec<BTreeMap<u32, f32>>)> {
    prop::collection::vec(arb_item(), 2..12).prop_flat_map(|items| {
        let count = items.len() as u32;
        (
            Just(items),
            prop::collection::vec(arb_ratings(count), 1..10),
        )
    })
}

fn build_graph(items: &[ItemSpec], users: &[BTreeMap<u32, f32>]) -> Arc<BipartiteGraph> {
    let graph = Arc::new(BipartiteGraph::new());
    for (id, spec) in items.iter().enumerate() {
        let genres = spec.genres.iter().map(|&g| GENRES[g].to_string()).collect();
        graph.add_item(ItemId(id as u32), genres, spec.length, spec.quality, spec.tier);
    }
    for (id, ratings) in users.iter().enumerate() {
        let ratings: Vec<Rating> = ratings
            .iter()
            .map(|(&item, &value)| Rating::new(ItemId(item), value))
            .collect();
        graph.add_user(UserId(id as u32), ratings);
    }
    graph
}

fn check_ranked(recs: &[Recommendation], rated: &[Rating], n: usize) -> Result<(), TestCaseError> {
    prop_assert!(recs.len() <= n);
    for pair in recs.windows(2) {
        prop_assert!(pair[0].score >= pair[1].score);
    }
    for rec in recs {
        prop_assert!(rated.iter().all(|r| r.item != rec.item));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_similarity_is_symmetric_and_reflexive((items, users) in arb_world()) {
        let graph = build_graph(&items, &users);
        let ranks = Arc::new(RankEngine::new(Arc::clone(&graph), RankOptions::default()));
        let collab = Collaborative::new(Arc::clone(&graph), ranks, CollaborativeOptions::default());
        let content = Content::new(Arc::clone(&graph), ContentOptions::default());

        for a in 0..users.len() as u32 {
            prop_assert_eq!(collab.calculate_similarity(UserId(a), UserId(a)), 1.0);
            for b in 0..users.len() as u32 {
                let forward = collab.calculate_similarity(UserId(a), UserId(b));
                let backward = collab.calculate_similarity(UserId(b), UserId(a));
                prop_assert!((forward - backward).abs() < 1e-12);
                prop_assert!(forward.is_finite());
                prop_assert!(forward <= 1.0 + 1e-9);
            }
        }
        for a in 0..items.len() as u32 {
            prop_assert_eq!(content.calculate_similarity(ItemId(a), ItemId(a)), 1.0);
            for b in 0..items.len() as u32 {
                let forward = content.calculate_similarity(ItemId(a), ItemId(b));
                let backward = content.calculate_similarity(ItemId(b), ItemId(a));
                prop_assert!((forward - backward).abs() < 1e-12);
                prop_assert!(forward.is_finite());
            }
        }
    }

    #[test]
    fn prop_ranks_are_normalized((items, users) in arb_world()) {
        let graph = build_graph(&items, &users);
        let ranks = RankEngine::new(Arc::clone(&graph), RankOptions::default());
        let all = ranks.ranks();
        prop_assert_eq!(all.len(), users.len());

        let floor = ranks.options().min_rank;
        let total: f64 = all.iter().map(|(_, r)| r).sum();
        // Flooring can lift the sum slightly above one.
        prop_assert!(total >= 1.0 - 1e-9);
        prop_assert!(total <= 1.0 + floor * all.len() as f64 + 1e-9);
        for (_, rank) in &all {
            prop_assert!(*rank >= floor);
            prop_assert!(*rank <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn prop_recommendations_are_ranked_and_unseen(
        (items, users) in arb_world(),
        n in 1usize..8,
        threads in 1usize..5,
    ) {
        let graph = build_graph(&items, &users);
        let ranks = Arc::new(RankEngine::new(Arc::clone(&graph), RankOptions::default()));
        let collab = Collaborative::new(Arc::clone(&graph), ranks, CollaborativeOptions::default());
        let content = Content::new(Arc::clone(&graph), ContentOptions::default());
        collab.precompute_similarities(threads).unwrap();
        content.precompute_similarities(threads).unwrap();

        for id in 0..users.len() as u32 {
            let user = UserId(id);
            let rated = graph.user_ratings(user).unwrap_or_default();
            check_ranked(&collab.get_recommendations(user, n), &rated, n)?;
            check_ranked(&content.get_recommendations(user, n), &rated, n)?;
        }
    }

    #[test]
    fn prop_eviction_halves_capacity(users in 4u32..30, capacity in 2usize..40) {
        let graph = Arc::new(BipartiteGraph::new());
        graph.add_item(ItemId(1), vec!["Drama".into()], 100, 7.0, 1);
        for id in 0..users {
            graph.add_user(UserId(id), Rating::from_pairs(&[(1, 1.0 + (id % 5) as f32)]));
        }
        let ranks = Arc::new(RankEngine::new(Arc::clone(&graph), RankOptions::default()));
        let collab = Collaborative::new(
            Arc::clone(&graph),
            ranks,
            CollaborativeOptions::default().max_cache_entries(capacity),
        );
        let stats = collab.precompute_similarities(2).unwrap();
        let pairs = (users * (users - 1) / 2) as usize;
        prop_assert_eq!(stats.stored, pairs);
        if pairs > capacity {
            prop_assert_eq!(collab.cache().len(), capacity / 2);
        } else {
            prop_assert_eq!(collab.cache().len(), pairs);
        }
    }
}
