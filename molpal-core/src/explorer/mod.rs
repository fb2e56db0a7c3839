//! The exploration loop.
//!
//! An [`Explorer`] owns the collaborators and the exploration state and
//! moves through four phases:
//!
//! ```text
//! Uninitialized ──explore_initial──► InitialRound ──explore_batch──► SteadyState
//!                                                                       │  ▲
//!                                                                       └──┘ explore_batch
//!                                     stopping condition (run) ──► Done
//! ```
//!
//! Loading previous scores counts as the initial round; resuming from
//! snapshots lands directly in the steady state.

mod cycle;
mod persist;

use std::path::PathBuf;

use molpal_paths::RunPaths;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ExplorerConfig;
use crate::error::Result;
use crate::gate::{ModelUpdateGate, check_compatibility};
use crate::state::ExplorationState;
use crate::stopping::{self, StopReason, StoppingCriteria};
use crate::topk;
use crate::traits::{
    Acquirer, Capability, Featurizer, Objective, Pool, Predictions, SurrogateModel,
};
use crate::types::{Count, Identifier};

/// Where the explorer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No round has run; only the initial round is allowed
    Uninitialized,
    /// The seeding round has completed
    InitialRound,
    /// At least one model-driven round has completed (or state was resumed)
    SteadyState,
    /// `run` hit a stopping condition
    Done,
}

/// The external components an explorer drives.
pub struct Collaborators<T> {
    pub pool: Box<dyn Pool<T>>,
    pub featurizer: Box<dyn Featurizer<T>>,
    pub acquirer: Box<dyn Acquirer<T>>,
    pub model: Box<dyn SurrogateModel<T>>,
    pub objective: Box<dyn Objective<T>>,
}

/// Outcome of one completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Epoch counter after the round
    pub epoch: usize,
    /// Inputs sent to the objective
    pub batch_size: usize,
    /// Mean of the batch's successful scores
    pub batch_average: Option<f64>,
    pub top_k_avg: Option<f64>,
}

/// Outcome of [`Explorer::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub epochs: usize,
    pub explored: usize,
    pub scored: usize,
    pub failed: usize,
    pub top_k_avg: Option<f64>,
    pub stop_reason: StopReason,
    /// `(fraction of pool, top-k average)`; `None` where the fraction
    /// covers no input
    pub top_averages: Vec<(f64, Option<f64>)>,
    /// Location of the final score table, when written
    pub final_scores: Option<PathBuf>,
}

/// Batched pool-based Bayesian optimization driver.
pub struct Explorer<T: Identifier> {
    config: ExplorerConfig,
    paths: RunPaths,
    pool: Box<dyn Pool<T>>,
    featurizer: Box<dyn Featurizer<T>>,
    acquirer: Box<dyn Acquirer<T>>,
    objective: Box<dyn Objective<T>>,
    gate: ModelUpdateGate<T>,
    state: ExplorationState<T>,
    /// Resolved top-k size
    k: usize,
    criteria: StoppingCriteria,
    /// Score tables written (or replayed) so far, in epoch order
    snapshots: Vec<PathBuf>,
    phase: Phase,
}

impl<T: Identifier> Explorer<T> {
    /// Validate the configuration, wire up the collaborators and load any
    /// prior state named by the config.
    ///
    /// Fails before any exploration if the configuration is invalid or the
    /// acquirer needs outputs the model cannot provide.
    pub fn new(config: ExplorerConfig, collaborators: Collaborators<T>) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            pool,
            featurizer,
            mut acquirer,
            model,
            objective,
        } = collaborators;

        let needs = acquirer.needs();
        let provides = model.provides();
        check_compatibility(acquirer.name(), &needs, model.name(), &provides)?;
        acquirer.set_stochastic_predictions(provides.contains(&Capability::Stochastic));

        let pool_size = pool.len();
        let k = config.k.resolve(pool_size).max(1);
        let criteria = StoppingCriteria {
            max_epochs: config.max_epochs,
            max_explore: config.max_explore.resolve(pool_size).max(1),
            delta: config.delta,
        };
        let paths = match &config.scratch {
            Some(scratch) => RunPaths::with_scratch(&config.root, &config.name, scratch),
            None => RunPaths::new(&config.root, &config.name),
        };

        info!(
            name = %config.name,
            pool = pool_size,
            k,
            max_explore = criteria.max_explore,
            acquirer = acquirer.name(),
            model = model.name(),
            "explorer ready"
        );

        let gate = ModelUpdateGate::new(model, &needs, config.retrain_from_scratch);
        let mut explorer = Self {
            state: ExplorationState::new(config.window_size),
            config,
            paths,
            pool,
            featurizer,
            acquirer,
            objective,
            gate,
            k,
            criteria,
            snapshots: Vec::new(),
            phase: Phase::Uninitialized,
        };
        explorer.load_configured_state()?;
        Ok(explorer)
    }

    /// Apply `previous_scores`, `checkpoint` or `scores_csvs`, in that
    /// order of precedence.
    fn load_configured_state(&mut self) -> Result<()> {
        let previous = self.config.previous_scores.clone();
        let checkpoint = self.config.checkpoint.clone();
        let tables = self.config.scores_csvs.clone();

        let sources = [previous.is_some(), checkpoint.is_some(), !tables.is_empty()];
        if sources.iter().filter(|set| **set).count() > 1 {
            warn!("several prior states configured; using the first of previous_scores, checkpoint, scores_csvs");
        }

        if let Some(path) = previous {
            self.load_scores(&path)
        } else if let Some(path) = checkpoint {
            self.resume(&path)
        } else if !tables.is_empty() {
            self.replay(&tables)
        } else {
            Ok(())
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    pub fn state(&self) -> &ExplorationState<T> {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> usize {
        self.state.epoch()
    }

    /// Resolved top-k size
    pub fn k(&self) -> usize {
        self.k
    }

    /// Resolved exploration budget
    pub fn max_explore(&self) -> usize {
        self.criteria.max_explore
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of explored inputs, successful or not
    pub fn len(&self) -> usize {
        self.state.size()
    }

    pub fn is_empty(&self) -> bool {
        self.state.size() == 0
    }

    pub fn top_k_avg(&self) -> Option<f64> {
        self.state.top_k_avg()
    }

    /// Score tables recorded for resumption, in epoch order
    pub fn snapshots(&self) -> &[PathBuf] {
        &self.snapshots
    }

    pub fn model(&self) -> &dyn SurrogateModel<T> {
        self.gate.model()
    }

    /// Latest predictions over the pool, if any were made
    pub fn predictions(&self) -> Option<&Predictions> {
        self.gate.predictions()
    }

    /// Which stopping condition holds, if any
    pub fn stop_reason(&self) -> Option<StopReason> {
        stopping::check(
            self.state.epoch(),
            self.state.scores().len(),
            self.state.top_k_avg(),
            self.state.recent_avgs(),
            &self.criteria,
        )
    }

    pub fn completed(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// Resolve a count against the pool size, defaulting to `k`.
    fn resolve(&self, count: Option<Count>) -> usize {
        count.map_or(self.k, |count| count.resolve(self.pool.len()))
    }

    /// Average of the top `count` scores (fractions are of the pool).
    pub fn avg(&self, count: Option<Count>) -> Result<f64> {
        topk::average(self.state.scores(), self.resolve(count))
    }

    /// The top `count` explored inputs, best first.
    pub fn top_explored(&self, count: Option<Count>) -> Vec<(T, f64)> {
        topk::top_k(self.state.scores(), self.resolve(count))
    }

    /// The top `count` inputs by predicted mean, best first; empty before
    /// the first prediction.
    pub fn top_preds(&self, count: Option<Count>) -> Vec<(T, f64)> {
        let count = self.resolve(count);
        match self.gate.predictions() {
            Some(preds) => topk::top_predicted(self.pool.identifiers(), &preds.means, count),
            None => Vec::new(),
        }
    }

    /// Current top-k average, `None` while nothing has scored.
    fn current_average(&self) -> Option<f64> {
        match topk::average(self.state.scores(), self.k) {
            Ok(avg) => Some(avg),
            Err(_) => {
                warn!(epoch = self.state.epoch(), "no successful scores to average");
                None
            }
        }
    }

    /// Recompute the top-k average and feed the convergence window.
    fn record_average(&mut self) {
        let avg = self.current_average();
        self.state.record_average(avg, self.k);
    }
}
