use std::collections::HashSet;

use indexmap::IndexMap;
use molpal_core::stopping::{self, StoppingCriteria};
use molpal_core::topk::{average, top_k};
use molpal_core::{ExplorationState, RecentAverages};
use proptest::prelude::*;

fn score_map(values: &[f64]) -> IndexMap<String, f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("m{i}"), *v))
        .collect()
}

/// Scores drawn from a small grid so ties are common
fn scores() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-20i32..20).prop_map(|v| v as f64 * 0.5), 0..60)
}

fn results() -> impl Strategy<Value = Vec<(String, Option<f64>)>> {
    prop::collection::vec(
        ((0u8..30).prop_map(|i| format!("x{i}")), prop::option::of(-50.0f64..50.0)),
        0..40,
    )
}

proptest! {
    #[test]
    fn top_k_is_sorted_distinct_subset(values in scores(), count in 0usize..80) {
        let map = score_map(&values);
        let top = top_k(&map, count);

        prop_assert_eq!(top.len(), count.min(map.len()));
        prop_assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
        let ids: HashSet<&String> = top.iter().map(|(id, _)| id).collect();
        prop_assert_eq!(ids.len(), top.len());
        for (id, score) in &top {
            prop_assert_eq!(map.get(id), Some(score));
        }
    }

    #[test]
    fn top_k_keeps_the_best(values in scores(), count in 1usize..80) {
        let map = score_map(&values);
        let top = top_k(&map, count);
        if let Some((_, worst_kept)) = top.last() {
            let kept: HashSet<&String> = top.iter().map(|(id, _)| id).collect();
            for (id, score) in &map {
                if !kept.contains(id) {
                    prop_assert!(score <= worst_kept);
                }
            }
        }
    }

    #[test]
    fn average_is_mean_of_top_k(values in scores(), count in 1usize..80) {
        prop_assume!(!values.is_empty());
        let map = score_map(&values);
        let top = top_k(&map, count);
        let expected = top.iter().map(|(_, s)| s).sum::<f64>() / top.len() as f64;
        let avg = average(&map, count).unwrap();
        prop_assert!((avg - expected).abs() < 1e-9);
    }

    #[test]
    fn merge_is_idempotent(batch in results()) {
        let mut once = ExplorationState::new(3);
        once.merge(batch.clone());
        let mut twice = ExplorationState::new(3);
        twice.merge(batch.clone());
        twice.merge(batch);

        prop_assert_eq!(once.scores(), twice.scores());
        prop_assert_eq!(once.failures(), twice.failures());
        prop_assert_eq!(once.size(), twice.size());
    }

    #[test]
    fn explored_count_never_shrinks(batches in prop::collection::vec(results(), 1..6)) {
        let mut state = ExplorationState::new(3);
        let mut last = 0;
        for batch in batches {
            state.merge(batch);
            prop_assert!(state.size() >= last);
            last = state.size();
        }
    }

    #[test]
    fn window_waits_for_k_and_stays_bounded(
        batches in prop::collection::vec(results(), 1..10),
        k in 1usize..15,
        capacity in 1usize..5,
    ) {
        let mut state = ExplorationState::new(capacity);
        for batch in batches {
            let before = state.recent_avgs().len();
            state.merge(batch);
            let avg = average(state.scores(), k).ok();
            state.record_average(avg, k);
            if state.scores().len() < k {
                prop_assert_eq!(state.recent_avgs().len(), before);
            }
            prop_assert!(state.recent_avgs().len() <= capacity);
        }
    }

    #[test]
    fn never_complete_before_budgets_or_full_window(
        max_epochs in 1usize..20,
        max_explore in 1usize..100,
        capacity in 2usize..6,
        averages in prop::collection::vec(-1e6f64..1e6, 0..6),
        top_k_avg in prop::option::of(-1e6f64..1e6),
        delta in -1.0f64..1.0,
    ) {
        let mut window = RecentAverages::new(capacity);
        for avg in averages.iter().take(capacity - 1) {
            window.push(*avg);
        }
        let criteria = StoppingCriteria { max_epochs, max_explore, delta };
        for epoch in 0..=max_epochs {
            prop_assert!(!stopping::is_complete(
                epoch,
                max_explore - 1,
                top_k_avg,
                &window,
                &criteria,
            ));
        }
    }
}
