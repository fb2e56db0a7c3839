//! Scripted collaborators for testing
//!
//! Every mock is cheap to clone and clones share their call log, so a test
//! can keep one handle while the explorer owns another:
//!
//! ```
//! use molpal_core::mock::{MockModel, MockPool};
//! use molpal_core::traits::SurrogateModel;
//!
//! let model = MockModel::<String>::new();
//! let mut owned: Box<dyn SurrogateModel<String>> = Box::new(model.clone());
//! let pool = MockPool::from_ids(["a", "b"]);
//! owned.predict(pool.identifiers_vec(), &[], true).unwrap();
//! assert_eq!(model.predict_calls(), vec![true]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::rc::Rc;

use molpal_paths::BatchPaths;

use crate::error::{ExploreError, Result};
use crate::traits::{
    Acquirer, BatchRequest, Capabilities, Capability, Featurizer, InitialRequest, Objective, Pool,
    Predictions, SurrogateModel,
};
use crate::types::EvaluationResults;

// ==================== Pool ====================

/// In-memory pool with one-dimensional positional features
#[derive(Debug, Clone)]
pub struct MockPool<T> {
    ids: Vec<T>,
    features: Vec<Vec<f64>>,
    cluster_ids: Option<Vec<usize>>,
    cluster_sizes: Option<HashMap<usize, usize>>,
}

impl<T> MockPool<T> {
    pub fn new(ids: Vec<T>) -> Self {
        let features = (0..ids.len()).map(|i| vec![i as f64]).collect();
        Self {
            ids,
            features,
            cluster_ids: None,
            cluster_sizes: None,
        }
    }

    /// Assign clusters (parallel to the identifiers)
    pub fn with_clusters(mut self, cluster_ids: Vec<usize>) -> Self {
        let mut sizes = HashMap::new();
        for id in &cluster_ids {
            *sizes.entry(*id).or_insert(0) += 1;
        }
        self.cluster_ids = Some(cluster_ids);
        self.cluster_sizes = Some(sizes);
        self
    }

    pub fn identifiers_vec(&self) -> &[T] {
        &self.ids
    }
}

impl MockPool<String> {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(Into::into).collect())
    }
}

impl<T> Pool<T> for MockPool<T> {
    fn identifiers(&self) -> &[T] {
        &self.ids
    }

    fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    fn cluster_ids(&self) -> Option<&[usize]> {
        self.cluster_ids.as_deref()
    }

    fn cluster_sizes(&self) -> Option<&HashMap<usize, usize>> {
        self.cluster_sizes.as_ref()
    }
}

// ==================== Featurizer ====================

/// Featurizes an identifier as the length of its display form
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFeaturizer;

impl<T: Display> Featurizer<T> for MockFeaturizer {
    fn featurize(&self, item: &T) -> Result<Vec<f64>> {
        Ok(vec![item.to_string().len() as f64])
    }
}

// ==================== Surrogate model ====================

/// One recorded `train` call
#[derive(Debug, Clone, PartialEq)]
pub struct TrainCall<T> {
    pub items: Vec<T>,
    pub values: Vec<f64>,
    pub retrain: bool,
}

#[derive(Debug)]
struct ModelLog<T> {
    train_calls: Vec<TrainCall<T>>,
    /// `mean_only` flag of every predict call
    predict_calls: Vec<bool>,
    known: HashMap<T, f64>,
}

/// Model that memorizes training values.
///
/// Known inputs predict their trained value with zero variance; unknown
/// inputs predict the mean of everything seen with unit variance.
#[derive(Debug)]
pub struct MockModel<T> {
    log: Rc<RefCell<ModelLog<T>>>,
    provides: Capabilities,
    prediction_len: Option<usize>,
}

impl<T> Clone for MockModel<T> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
            provides: self.provides.clone(),
            prediction_len: self.prediction_len,
        }
    }
}

impl<T: Clone + Eq + Hash> MockModel<T> {
    /// Provides means and variances
    pub fn new() -> Self {
        Self::providing([Capability::Means, Capability::Variances].into())
    }

    pub fn providing(provides: Capabilities) -> Self {
        Self {
            log: Rc::new(RefCell::new(ModelLog {
                train_calls: Vec::new(),
                predict_calls: Vec::new(),
                known: HashMap::new(),
            })),
            provides,
            prediction_len: None,
        }
    }

    /// Force every prediction to have `len` entries (to simulate a broken model)
    pub fn with_prediction_len(mut self, len: usize) -> Self {
        self.prediction_len = Some(len);
        self
    }

    pub fn train_calls(&self) -> Vec<TrainCall<T>> {
        self.log.borrow().train_calls.clone()
    }

    pub fn predict_calls(&self) -> Vec<bool> {
        self.log.borrow().predict_calls.clone()
    }
}

impl<T: Clone + Eq + Hash> Default for MockModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> SurrogateModel<T> for MockModel<T> {
    fn name(&self) -> &str {
        "mock"
    }

    fn provides(&self) -> Capabilities {
        self.provides.clone()
    }

    fn train(
        &mut self,
        items: &[T],
        values: &[f64],
        retrain: bool,
        featurizer: &dyn Featurizer<T>,
    ) -> Result<()> {
        if items.len() != values.len() {
            return Err(ExploreError::Model(format!(
                "{} items but {} values",
                items.len(),
                values.len()
            )));
        }
        for item in items {
            featurizer.featurize(item)?;
        }

        let mut log = self.log.borrow_mut();
        if retrain {
            log.known.clear();
        }
        for (item, value) in items.iter().zip(values) {
            log.known.insert(item.clone(), *value);
        }
        log.train_calls.push(TrainCall {
            items: items.to_vec(),
            values: values.to_vec(),
            retrain,
        });
        Ok(())
    }

    fn predict(
        &mut self,
        items: &[T],
        _features: &[Vec<f64>],
        mean_only: bool,
    ) -> Result<Predictions> {
        let mut log = self.log.borrow_mut();
        log.predict_calls.push(mean_only);

        let prior = if log.known.is_empty() {
            0.0
        } else {
            log.known.values().sum::<f64>() / log.known.len() as f64
        };
        let len = self.prediction_len.unwrap_or(items.len());

        let mut means = Vec::with_capacity(len);
        let mut variances = Vec::new();
        for i in 0..len {
            let known = items.get(i).and_then(|item| log.known.get(item)).copied();
            means.push(known.unwrap_or(prior));
            if !mean_only {
                variances.push(if known.is_some() { 0.0 } else { 1.0 });
            }
        }
        Ok(Predictions { means, variances })
    }
}

// ==================== Acquirer ====================

#[derive(Debug, Default)]
struct AcquirerLog {
    initial_calls: usize,
    /// Epoch of every batch call
    batch_epochs: Vec<usize>,
    /// Whether each batch call received variances
    saw_variances: Vec<bool>,
    stochastic: Option<bool>,
}

/// Deterministic greedy acquirer.
///
/// The initial round takes the first `init_size` pool members (one per
/// cluster first, when the pool is clustered). Batches take the
/// `batch_size` unexplored inputs with the highest predicted mean, ties in
/// pool order.
#[derive(Debug, Clone)]
pub struct MockAcquirer {
    init_size: usize,
    batch_size: usize,
    needs: Capabilities,
    log: Rc<RefCell<AcquirerLog>>,
}

impl MockAcquirer {
    pub fn new(init_size: usize, batch_size: usize) -> Self {
        Self {
            init_size,
            batch_size,
            needs: [Capability::Means].into(),
            log: Rc::new(RefCell::new(AcquirerLog::default())),
        }
    }

    pub fn needing(mut self, needs: Capabilities) -> Self {
        self.needs = needs;
        self
    }

    pub fn initial_calls(&self) -> usize {
        self.log.borrow().initial_calls
    }

    pub fn batch_epochs(&self) -> Vec<usize> {
        self.log.borrow().batch_epochs.clone()
    }

    pub fn saw_variances(&self) -> Vec<bool> {
        self.log.borrow().saw_variances.clone()
    }

    pub fn stochastic(&self) -> Option<bool> {
        self.log.borrow().stochastic
    }
}

impl<T: Clone + Eq + Hash> Acquirer<T> for MockAcquirer {
    fn name(&self) -> &str {
        "greedy"
    }

    fn needs(&self) -> Capabilities {
        self.needs.clone()
    }

    fn set_stochastic_predictions(&mut self, stochastic: bool) {
        self.log.borrow_mut().stochastic = Some(stochastic);
    }

    fn acquire_initial(&mut self, request: InitialRequest<'_, T>) -> Vec<T> {
        self.log.borrow_mut().initial_calls += 1;

        let mut order: Vec<usize> = (0..request.identifiers.len()).collect();
        if let Some(clusters) = request.cluster_ids {
            // cluster representatives first, then everything else
            let mut seen = std::collections::HashSet::new();
            let (heads, rest): (Vec<usize>, Vec<usize>) =
                order.iter().partition(|&&i| seen.insert(clusters[i]));
            order = heads.into_iter().chain(rest).collect();
        }

        order
            .into_iter()
            .take(self.init_size)
            .map(|i| request.identifiers[i].clone())
            .collect()
    }

    fn acquire_batch(&mut self, request: BatchRequest<'_, T>) -> Vec<T> {
        {
            let mut log = self.log.borrow_mut();
            log.batch_epochs.push(request.epoch);
            log.saw_variances.push(!request.variances.is_empty());
        }

        let mut candidates: Vec<usize> = (0..request.identifiers.len())
            .filter(|&i| !request.explored.contains(&request.identifiers[i]))
            .collect();
        candidates.sort_by(|&a, &b| request.means[b].total_cmp(&request.means[a]));

        candidates
            .into_iter()
            .take(self.batch_size)
            .map(|i| request.identifiers[i].clone())
            .collect()
    }
}

// ==================== Objective ====================

#[derive(Debug)]
struct ObjectiveLog<T> {
    batches: Vec<Vec<T>>,
    paths: Vec<BatchPaths>,
}

/// Lookup-table objective. Inputs missing from the table (or mapped to
/// `None`) fail.
#[derive(Debug)]
pub struct MockObjective<T> {
    table: Rc<HashMap<T, Option<f64>>>,
    log: Rc<RefCell<ObjectiveLog<T>>>,
}

impl<T> Clone for MockObjective<T> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
            log: Rc::clone(&self.log),
        }
    }
}

impl<T: Clone + Eq + Hash> MockObjective<T> {
    pub fn new(table: HashMap<T, Option<f64>>) -> Self {
        Self {
            table: Rc::new(table),
            log: Rc::new(RefCell::new(ObjectiveLog {
                batches: Vec::new(),
                paths: Vec::new(),
            })),
        }
    }

    pub fn batches(&self) -> Vec<Vec<T>> {
        self.log.borrow().batches.clone()
    }

    pub fn paths(&self) -> Vec<BatchPaths> {
        self.log.borrow().paths.clone()
    }
}

impl MockObjective<String> {
    /// Table from `(identifier, score)` pairs
    pub fn from_scores<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        Self::new(
            entries
                .into_iter()
                .map(|(id, score)| (id.to_string(), score))
                .collect(),
        )
    }
}

impl<T: Clone + Eq + Hash> Objective<T> for MockObjective<T> {
    fn evaluate(&mut self, batch: &[T], paths: &BatchPaths) -> Result<EvaluationResults<T>> {
        {
            let mut log = self.log.borrow_mut();
            log.batches.push(batch.to_vec());
            log.paths.push(paths.clone());
        }
        Ok(batch
            .iter()
            .map(|item| (item.clone(), self.table.get(item).copied().flatten()))
            .collect())
    }
}
