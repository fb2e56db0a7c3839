//! Top-k selection over observed scores and over predictions.
//!
//! Rankings are descending by value. Equal values keep their insertion
//! (or pool) order, so results are reproducible.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use indexmap::IndexMap;

use crate::error::{ExploreError, Result};

/// Below this fraction of the score map a bounded heap beats a full sort.
const PARTIAL_SELECTION_RATIO: f64 = 0.8;

/// A candidate during selection: higher value wins, earlier position wins ties.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    value: f64,
    position: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Keep the best `count` of `values` using a min-heap of size `count`.
///
/// Returns positions ordered best first. Cost is O(n log count).
fn select_best<I>(values: I, count: usize) -> Vec<usize>
where
    I: IntoIterator<Item = f64>,
{
    if count == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(count + 1);
    for (position, value) in values.into_iter().enumerate() {
        let candidate = Ranked { value, position };
        if heap.len() < count {
            heap.push(Reverse(candidate));
        } else if let Some(Reverse(worst)) = heap.peek()
            && candidate > *worst
        {
            heap.pop();
            heap.push(Reverse(candidate));
        }
    }

    // into_sorted_vec on Reverse yields best first
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| ranked.position)
        .collect()
}

/// The `count` highest-scoring entries of `scores`, best first.
///
/// `count` is clamped to the number of scores. Uses partial selection when
/// `count` is well below the map size and a stable full sort otherwise.
pub fn top_k<T: Clone>(scores: &IndexMap<T, f64>, count: usize) -> Vec<(T, f64)> {
    let count = count.min(scores.len());
    if count == 0 {
        return Vec::new();
    }

    if (count as f64) < PARTIAL_SELECTION_RATIO * scores.len() as f64 {
        return select_best(scores.values().copied(), count)
            .into_iter()
            .filter_map(|i| scores.get_index(i))
            .map(|(item, score)| (item.clone(), *score))
            .collect();
    }

    let mut ranked: Vec<(T, f64)> = scores
        .iter()
        .map(|(item, score)| (item.clone(), *score))
        .collect();
    // stable: equal scores keep insertion order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(count);
    ranked
}

/// Mean of the `count` best scores.
///
/// Fails with [`ExploreError::EmptyScores`] when `count` (after clamping to
/// the number of scores) is zero.
pub fn average<T: Clone>(scores: &IndexMap<T, f64>, count: usize) -> Result<f64> {
    let top = top_k(scores, count);
    if top.is_empty() {
        return Err(ExploreError::EmptyScores);
    }
    Ok(top.iter().map(|(_, score)| score).sum::<f64>() / top.len() as f64)
}

/// The `count` inputs with the highest predicted mean, best first.
///
/// Streams over the whole pool with a heap bounded at `count`, so memory
/// stays O(count) however large the pool is.
pub fn top_predicted<T: Clone>(identifiers: &[T], means: &[f64], count: usize) -> Vec<(T, f64)> {
    let count = count.min(identifiers.len()).min(means.len());
    select_best(means.iter().copied(), count)
        .into_iter()
        .map(|i| (identifiers[i].clone(), means[i]))
        .collect()
}
