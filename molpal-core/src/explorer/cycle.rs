use tracing::{debug, info, instrument, warn};

use super::{EpochSummary, Explorer, Phase, RunSummary};
use crate::error::{ExploreError, Result};
use crate::traits::{BatchRequest, InitialRequest};
use crate::types::{Count, EvaluationResults, Identifier};

/// Mean of the successful values in a batch.
fn batch_average<T>(results: &EvaluationResults<T>) -> Option<f64> {
    let valid: Vec<f64> = results
        .values()
        .filter_map(|v| v.filter(|v| v.is_finite()))
        .collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

impl<T: Identifier> Explorer<T> {
    /// Seed the exploration: acquire without a model, evaluate, merge.
    ///
    /// Fails with [`ExploreError::AlreadyInitialized`] once any round has run
    /// or prior state was loaded.
    #[instrument(skip(self), fields(epoch = self.state.epoch()))]
    pub fn explore_initial(&mut self) -> Result<EpochSummary> {
        if self.phase != Phase::Uninitialized {
            return Err(ExploreError::AlreadyInitialized);
        }

        let batch = self.acquirer.acquire_initial(InitialRequest {
            identifiers: self.pool.identifiers(),
            cluster_ids: self.pool.cluster_ids(),
            cluster_sizes: self.pool.cluster_sizes(),
        });

        let summary = self.evaluate_and_merge(batch)?;
        self.phase = Phase::InitialRound;
        Ok(summary)
    }

    /// One model-driven round.
    ///
    /// Fails with [`ExploreError::Uninitialized`] before the initial round.
    /// Once every pool member has been explored the round is a no-op that
    /// only advances the epoch.
    #[instrument(skip(self), fields(epoch = self.state.epoch()))]
    pub fn explore_batch(&mut self) -> Result<EpochSummary> {
        if self.phase == Phase::Uninitialized || self.state.epoch() == 0 {
            return Err(ExploreError::Uninitialized);
        }

        if self.state.size() >= self.pool.len() {
            debug!("pool exhausted, advancing epoch only");
            self.close_epoch()?;
            self.phase = Phase::SteadyState;
            return Ok(EpochSummary {
                epoch: self.state.epoch(),
                batch_size: 0,
                batch_average: None,
                top_k_avg: self.state.top_k_avg(),
            });
        }

        self.gate
            .maybe_update_model(&mut self.state, self.featurizer.as_ref())?;
        if self.gate.maybe_refresh_predictions(self.pool.as_ref())? && self.config.save_preds {
            self.write_predictions()?;
        }

        let batch = match self.gate.predictions() {
            Some(preds) => self.acquirer.acquire_batch(BatchRequest {
                identifiers: self.pool.identifiers(),
                means: &preds.means,
                variances: &preds.variances,
                explored: self.state.explored(),
                cluster_ids: self.pool.cluster_ids(),
                cluster_sizes: self.pool.cluster_sizes(),
                epoch: self.state.epoch(),
            }),
            None => {
                return Err(ExploreError::Model(format!(
                    "{} produced no predictions",
                    self.gate.model().name()
                )));
            }
        };

        let summary = self.evaluate_and_merge(batch)?;
        self.phase = Phase::SteadyState;
        Ok(summary)
    }

    /// Score a batch, fold it into the state and close the epoch.
    fn evaluate_and_merge(&mut self, batch: Vec<T>) -> Result<EpochSummary> {
        let epoch = self.state.epoch();
        let batch_size = batch.len();

        let mut results = if batch.is_empty() {
            warn!(epoch, acquirer = self.acquirer.name(), "acquirer returned an empty batch");
            EvaluationResults::new()
        } else {
            let paths = self.paths.batch(epoch);
            self.objective.evaluate(&batch, &paths)?
        };

        let missing: Vec<T> = batch
            .into_iter()
            .filter(|item| !results.contains_key(item))
            .collect();
        if !missing.is_empty() {
            warn!(epoch, missing = missing.len(), "objective returned no result for some inputs");
            results.extend(missing.into_iter().map(|item| (item, None)));
        }

        let batch_average = batch_average(&results);
        if batch_average.is_none() && batch_size > 0 {
            warn!(epoch, batch_size, "every input in the batch failed");
        }

        self.state.merge(results);
        self.record_average();
        self.close_epoch()?;

        let summary = EpochSummary {
            epoch: self.state.epoch(),
            batch_size,
            batch_average,
            top_k_avg: self.state.top_k_avg(),
        };
        debug!(
            epoch = summary.epoch,
            batch_size,
            explored = self.state.size(),
            top_k_avg = ?summary.top_k_avg,
            "epoch complete"
        );
        Ok(summary)
    }

    /// Persist the epoch's snapshot (when writing intermediates), advance
    /// the epoch and checkpoint the new boundary.
    fn close_epoch(&mut self) -> Result<()> {
        if self.config.write_intermediate {
            self.write_snapshot(self.config.snapshot_size, true)?;
        }
        self.state.advance_epoch();
        if self.config.write_intermediate {
            self.save_checkpoint()?;
        }
        Ok(())
    }

    /// Explore until a stopping condition holds.
    ///
    /// Starts with the initial round on a fresh explorer and with a batch
    /// round when prior state was loaded.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.phase == Phase::Uninitialized {
            info!(name = %self.config.name, "starting exploration");
            self.explore_initial()?;
        } else {
            info!(epoch = self.state.epoch(), "resuming exploration");
            self.explore_batch()?;
        }

        let stop_reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }
            debug!(k = self.k, top_k_avg = ?self.state.top_k_avg(), "continuing exploration");
            self.explore_batch()?;
        };
        self.phase = Phase::Done;

        info!(
            explored = self.state.size(),
            epochs = self.state.epoch(),
            reason = %stop_reason,
            "finished exploring"
        );
        if let Some(avg) = self.state.top_k_avg() {
            info!(k = self.k, avg, "final top-k average");
        }

        let top_averages = self
            .config
            .summary_fractions
            .clone()
            .into_iter()
            .map(|fraction| (fraction, self.summary_average(fraction)))
            .collect::<Vec<_>>();
        for (fraction, avg) in &top_averages {
            if let Some(avg) = avg {
                info!(percent = fraction * 100.0, avg, "top average");
            }
        }

        let final_scores = if self.config.write_final {
            Some(self.write_final()?)
        } else {
            None
        };

        Ok(RunSummary {
            epochs: self.state.epoch(),
            explored: self.state.size(),
            scored: self.state.scores().len(),
            failed: self.state.failures().len(),
            top_k_avg: self.state.top_k_avg(),
            stop_reason,
            top_averages,
            final_scores,
        })
    }

    /// Top-k average for a pool fraction, `None` if it covers no input.
    fn summary_average(&self, fraction: f64) -> Option<f64> {
        let count = Count::Fraction(fraction);
        if count.resolve(self.pool.len()) == 0 {
            return None;
        }
        self.avg(Some(count)).ok()
    }
}
