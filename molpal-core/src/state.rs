//! Exploration state: scored and failed inputs, epoch, top-k averages.
//!
//! The explorer is the only writer. Maps are insertion-ordered so that
//! ranking ties break the same way on every run.

use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::traits::ExploredSet;
use crate::window::RecentAverages;

/// Everything the explorer has learned about the pool so far.
#[derive(Debug, Clone)]
pub struct ExplorationState<T> {
    /// Successfully evaluated inputs and their objective values
    scores: IndexMap<T, f64>,
    /// Inputs whose evaluation produced no usable value
    failures: IndexSet<T>,
    /// Scores gathered since the last model update
    new_scores: IndexMap<T, f64>,
    /// Completed rounds
    epoch: usize,
    /// Top-k average after the latest round, if any input has scored
    top_k_avg: Option<f64>,
    recent_avgs: RecentAverages,
}

impl<T: Clone + Eq + Hash> ExplorationState<T> {
    /// Empty state whose recent-averages window holds `window_size` entries
    pub fn new(window_size: usize) -> Self {
        Self {
            scores: IndexMap::new(),
            failures: IndexSet::new(),
            new_scores: IndexMap::new(),
            epoch: 0,
            top_k_avg: None,
            recent_avgs: RecentAverages::new(window_size),
        }
    }

    /// Fold one batch of evaluation results into the state.
    ///
    /// Upsert semantics: re-applying the same results changes nothing. A
    /// success clears an earlier failure of the same input. A failure never
    /// removes an existing score. Non-finite values count as failures.
    pub fn merge<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = (T, Option<f64>)>,
    {
        for (item, value) in results {
            match value.filter(|v| v.is_finite()) {
                Some(score) => {
                    self.failures.shift_remove(&item);
                    self.new_scores.insert(item.clone(), score);
                    self.scores.insert(item, score);
                }
                None if self.scores.contains_key(&item) => {
                    trace!("keeping earlier score for re-failed input");
                }
                None => {
                    self.failures.insert(item);
                }
            }
        }
    }

    /// Fold a reloaded snapshot into the state.
    ///
    /// Snapshots are cumulative, so only inputs scored for the first time
    /// count as new training data.
    pub fn merge_snapshot(&mut self, scores: IndexMap<T, f64>, failures: IndexSet<T>) {
        for (item, score) in scores {
            if !self.scores.contains_key(&item) {
                self.new_scores.insert(item.clone(), score);
            }
            self.failures.shift_remove(&item);
            self.scores.insert(item, score);
        }
        for item in failures {
            if !self.scores.contains_key(&item) {
                self.failures.insert(item);
            }
        }
    }

    /// Total number of evaluated inputs
    pub fn size(&self) -> usize {
        self.scores.len() + self.failures.len()
    }

    pub fn scores(&self) -> &IndexMap<T, f64> {
        &self.scores
    }

    pub fn failures(&self) -> &IndexSet<T> {
        &self.failures
    }

    pub fn new_scores(&self) -> &IndexMap<T, f64> {
        &self.new_scores
    }

    /// Hand over the new scores, leaving none behind
    pub fn take_new_scores(&mut self) -> IndexMap<T, f64> {
        std::mem::take(&mut self.new_scores)
    }

    pub fn explored(&self) -> ExploredSet<'_, T> {
        ExploredSet::new(&self.scores, &self.failures)
    }

    pub fn is_explored(&self, item: &T) -> bool {
        self.scores.contains_key(item) || self.failures.contains(item)
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub(crate) fn advance_epoch(&mut self) {
        self.epoch += 1;
    }

    pub(crate) fn set_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }

    pub fn top_k_avg(&self) -> Option<f64> {
        self.top_k_avg
    }

    pub fn recent_avgs(&self) -> &RecentAverages {
        &self.recent_avgs
    }

    /// Record the latest top-k average.
    ///
    /// It enters the convergence window only once at least `k` inputs have
    /// scored, so an undersized top-k set cannot fake convergence.
    pub fn record_average(&mut self, average: Option<f64>, k: usize) {
        self.top_k_avg = average;
        if let Some(avg) = average
            && self.scores.len() >= k
        {
            self.recent_avgs.push(avg);
        }
    }
}
