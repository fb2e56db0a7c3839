//! Collaborator interfaces consumed by the explorer.
//!
//! The explorer never featurizes, clusters, models or scores anything
//! itself. It drives five collaborators through the traits below:
//!
//! ```text
//! Pool ──────────► identifiers, features, clusters
//! Acquirer ──────► which inputs to evaluate next
//! SurrogateModel ► train on scores, predict over the pool
//! Featurizer ────► identifier → feature vector (for training)
//! Objective ─────► ground-truth scores for a batch
//! ```

use std::collections::{BTreeSet, HashMap};

use indexmap::{IndexMap, IndexSet};
use molpal_paths::BatchPaths;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::EvaluationResults;

/// An output a surrogate model can provide and an acquirer can need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Posterior mean
    Means,
    /// Posterior variance
    Variances,
    /// Predictions are samples rather than deterministic estimates
    Stochastic,
}

/// A set of capabilities.
pub type Capabilities = BTreeSet<Capability>;

/// The fixed universe of candidates.
///
/// All slices are parallel to [`Pool::identifiers`] and must keep the same
/// order for the lifetime of a run.
pub trait Pool<T> {
    fn identifiers(&self) -> &[T];

    /// Precomputed feature vectors, one per identifier.
    fn features(&self) -> &[Vec<f64>];

    /// Cluster assignment per identifier, if the pool is clustered.
    fn cluster_ids(&self) -> Option<&[usize]> {
        None
    }

    /// Number of members per cluster, if the pool is clustered.
    fn cluster_sizes(&self) -> Option<&HashMap<usize, usize>> {
        None
    }

    fn len(&self) -> usize {
        self.identifiers().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns an identifier into the feature vector a model trains on.
pub trait Featurizer<T> {
    fn featurize(&self, item: &T) -> Result<Vec<f64>>;
}

/// Read-only view of every input explored so far, successful or not.
#[derive(Debug)]
pub struct ExploredSet<'a, T> {
    scores: &'a IndexMap<T, f64>,
    failures: &'a IndexSet<T>,
}

impl<T> Clone for ExploredSet<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ExploredSet<'_, T> {}

impl<'a, T: std::hash::Hash + Eq> ExploredSet<'a, T> {
    pub(crate) fn new(scores: &'a IndexMap<T, f64>, failures: &'a IndexSet<T>) -> Self {
        Self { scores, failures }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.scores.contains_key(item) || self.failures.contains(item)
    }

    /// Number of distinct explored inputs.
    pub fn len(&self) -> usize {
        self.scores.len()
            + self
                .failures
                .iter()
                .filter(|item| !self.scores.contains_key(*item))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.failures.is_empty()
    }
}

/// Arguments for the seeding round, before any model exists.
#[derive(Debug)]
pub struct InitialRequest<'a, T> {
    pub identifiers: &'a [T],
    pub cluster_ids: Option<&'a [usize]>,
    pub cluster_sizes: Option<&'a HashMap<usize, usize>>,
}

/// Arguments for a model-driven round.
#[derive(Debug)]
pub struct BatchRequest<'a, T> {
    pub identifiers: &'a [T],
    /// Predicted means, parallel to `identifiers`
    pub means: &'a [f64],
    /// Predicted variances, parallel to `identifiers`; empty when not requested
    pub variances: &'a [f64],
    pub explored: ExploredSet<'a, T>,
    pub cluster_ids: Option<&'a [usize]>,
    pub cluster_sizes: Option<&'a HashMap<usize, usize>>,
    pub epoch: usize,
}

/// Selection heuristic over posterior predictions.
pub trait Acquirer<T> {
    /// Metric name, used in diagnostics.
    fn name(&self) -> &str;

    /// Model outputs this acquirer reads.
    fn needs(&self) -> Capabilities;

    /// Told once at construction whether predictions are stochastic.
    fn set_stochastic_predictions(&mut self, _stochastic: bool) {}

    /// Seed selection (random, cluster-based, ...) used for the first round.
    fn acquire_initial(&mut self, request: InitialRequest<'_, T>) -> Vec<T>;

    /// Select the next batch from unexplored inputs.
    fn acquire_batch(&mut self, request: BatchRequest<'_, T>) -> Vec<T>;
}

/// Mean and variance arrays over a sequence of inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    pub means: Vec<f64>,
    /// Empty when the model was asked for means only
    pub variances: Vec<f64>,
}

/// Trainable predictor over the pool.
pub trait SurrogateModel<T> {
    /// Model type name, used in diagnostics.
    fn name(&self) -> &str;

    /// Outputs this model can produce.
    fn provides(&self) -> Capabilities;

    /// Train on `(items[i], values[i])` pairs.
    ///
    /// With `retrain` set the model starts from scratch on exactly this data;
    /// otherwise it updates online, in whatever sense the model defines.
    fn train(
        &mut self,
        items: &[T],
        values: &[f64],
        retrain: bool,
        featurizer: &dyn Featurizer<T>,
    ) -> Result<()>;

    /// Predict over `items` (with matching `features`).
    fn predict(&mut self, items: &[T], features: &[Vec<f64>], mean_only: bool)
    -> Result<Predictions>;
}

/// Expensive ground-truth scoring.
///
/// Per-input failures are reported as `None` entries, never as errors. An
/// `Err` means the whole call could not run.
pub trait Objective<T> {
    fn evaluate(&mut self, batch: &[T], paths: &BatchPaths) -> Result<EvaluationResults<T>>;
}
