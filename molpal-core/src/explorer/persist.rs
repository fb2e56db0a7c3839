use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::{Explorer, Phase};
use crate::error::Result;
use crate::persistence::{self, Checkpoint};
use crate::topk;
use crate::types::{Count, Identifier};

impl<T: Identifier> Explorer<T> {
    /// Write the top `m` explored inputs as an intermediate snapshot and
    /// record it for resumption.
    ///
    /// Fractions of `m` are of the explored inputs, not the pool. Failures
    /// follow the scores when `include_failed` is set.
    pub fn write_snapshot(&mut self, m: Count, include_failed: bool) -> Result<PathBuf> {
        let m = m.resolve(self.state.size());
        let path = self.paths.scores_file(m, self.state.epoch());

        let top = topk::top_k(self.state.scores(), m);
        let scored = top.iter().map(|(item, score)| (item, Some(*score)));
        if include_failed {
            let failed = self.state.failures().iter().map(|item| (item, None));
            persistence::write_scores(&path, scored.chain(failed))?;
        } else {
            persistence::write_scores(&path, scored)?;
        }

        self.snapshots.push(path.clone());
        Ok(path)
    }

    /// Write every explored input, scores first (best first), then failures.
    pub fn write_final(&self) -> Result<PathBuf> {
        let path = self.paths.final_scores_file();
        let ranked = topk::top_k(self.state.scores(), self.state.scores().len());
        let rows = ranked
            .iter()
            .map(|(item, score)| (item, Some(*score)))
            .chain(self.state.failures().iter().map(|item| (item, None)));
        persistence::write_scores(&path, rows)?;
        info!(path = %path.display(), "wrote final scores");
        Ok(path)
    }

    /// Write a checkpoint listing the snapshots written so far.
    pub fn save_checkpoint(&self) -> Result<PathBuf> {
        let path = self.paths.checkpoint_file(self.state.epoch());
        Checkpoint::new(self.paths.name(), self.state.epoch(), self.snapshots.clone())
            .save(&path)?;
        debug!(path = %path.display(), snapshots = self.snapshots.len(), "saved checkpoint");
        Ok(path)
    }

    /// Write the current pool predictions, if any exist.
    pub fn write_predictions(&self) -> Result<Option<PathBuf>> {
        let Some(preds) = self.gate.predictions() else {
            return Ok(None);
        };
        let path = self.paths.predictions_file(self.state.epoch());
        persistence::write_predictions(
            &path,
            self.pool.identifiers(),
            &preds.means,
            &preds.variances,
        )?;
        Ok(Some(path))
    }

    /// Treat a score table as the initialization batch.
    ///
    /// Its scores count as new training data. The epoch becomes 1 if no
    /// round has run yet.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_scores(&mut self, path: &Path) -> Result<()> {
        let table = persistence::read_scores::<T>(path)?;
        info!(
            scores = table.scores.len(),
            failures = table.failures.len(),
            "loaded previous scores"
        );

        let rows = table
            .scores
            .into_iter()
            .map(|(item, score)| (item, Some(score)))
            .chain(table.failures.into_iter().map(|item| (item, None)));
        self.state.merge(rows);
        self.record_average();

        if self.state.epoch() == 0 {
            self.state.set_epoch(1);
        }
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::InitialRound;
        }
        Ok(())
    }

    /// Resume from a checkpoint file by replaying its snapshots.
    pub fn resume(&mut self, checkpoint: &Path) -> Result<()> {
        let checkpoint = Checkpoint::load(checkpoint)?;
        info!(
            name = %checkpoint.name,
            epoch = checkpoint.epoch,
            created_at = %checkpoint.created_at,
            "resuming from checkpoint"
        );
        self.replay(&checkpoint.snapshots)
    }

    /// Replay snapshots in order, one epoch each.
    ///
    /// Every snapshot is merged, the model is updated on what was new in it
    /// (deferred to the next round when retraining from scratch), and the
    /// top-k average is recomputed, reproducing the epoch boundaries of the
    /// run that wrote them. A snapshot taken once the whole pool had been
    /// explored only advances the epoch, as the round that wrote it did.
    #[instrument(skip_all, fields(snapshots = tables.len()))]
    pub fn replay(&mut self, tables: &[PathBuf]) -> Result<()> {
        for table_path in tables {
            let exhausted = self.state.size() >= self.pool.len();
            let table = persistence::read_scores::<T>(table_path)?;
            self.state.merge_snapshot(table.scores, table.failures);

            if !exhausted {
                if !self.gate.retrain_from_scratch() {
                    self.gate
                        .maybe_update_model(&mut self.state, self.featurizer.as_ref())?;
                }
                self.record_average();
            }
            self.state.advance_epoch();
            self.snapshots.push(table_path.clone());
            debug!(
                epoch = self.state.epoch(),
                explored = self.state.size(),
                "replayed snapshot"
            );
        }

        if self.state.epoch() > 0 {
            self.phase = Phase::SteadyState;
        }
        Ok(())
    }
}
