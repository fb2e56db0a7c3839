//! Model update gating and prediction staleness.
//!
//! The gate owns the surrogate model and the prediction cache. It decides
//! which data the model trains on and whether the cache has to be rebuilt:
//!
//! ```text
//! new scores? ──no──► nothing to do
//!      │yes
//!      ▼
//! train (all scores if retraining, else only new ones)
//!      │
//!      ▼
//! predictions stale ──► next refresh re-predicts the whole pool
//! ```

use tracing::{debug, instrument};

use crate::error::{ExploreError, Result};
use crate::state::ExplorationState;
use crate::traits::{Capabilities, Capability, Featurizer, Pool, Predictions, SurrogateModel};

/// Fail fast when the acquirer needs outputs the model cannot provide.
pub fn check_compatibility(
    acquirer: &str,
    needs: &Capabilities,
    model: &str,
    provides: &Capabilities,
) -> Result<()> {
    if needs.is_subset(provides) {
        Ok(())
    } else {
        Err(ExploreError::Incompatible {
            acquirer: acquirer.to_string(),
            needs: needs.clone(),
            model: model.to_string(),
            provides: provides.clone(),
        })
    }
}

/// Decides when the surrogate model trains and when predictions refresh.
pub struct ModelUpdateGate<T> {
    model: Box<dyn SurrogateModel<T>>,
    retrain_from_scratch: bool,
    /// Whether the acquirer reads variances
    wants_variances: bool,
    /// Predictions no longer reflect the model
    stale: bool,
    cache: Option<Predictions>,
}

impl<T: Clone + Eq + std::hash::Hash> ModelUpdateGate<T> {
    pub fn new(
        model: Box<dyn SurrogateModel<T>>,
        acquirer_needs: &Capabilities,
        retrain_from_scratch: bool,
    ) -> Self {
        Self {
            model,
            retrain_from_scratch,
            wants_variances: acquirer_needs.contains(&Capability::Variances),
            stale: false,
            cache: None,
        }
    }

    pub fn model(&self) -> &dyn SurrogateModel<T> {
        self.model.as_ref()
    }

    pub fn retrain_from_scratch(&self) -> bool {
        self.retrain_from_scratch
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn predictions(&self) -> Option<&Predictions> {
        self.cache.as_ref()
    }

    /// Train on whatever arrived since the last update.
    ///
    /// Returns whether the model was trained. With no new scores this is a
    /// no-op: it does not make predictions stale (nor fresh).
    #[instrument(skip_all, fields(retrain = self.retrain_from_scratch))]
    pub fn maybe_update_model(
        &mut self,
        state: &mut ExplorationState<T>,
        featurizer: &dyn Featurizer<T>,
    ) -> Result<bool> {
        if state.new_scores().is_empty() {
            return Ok(false);
        }

        let (items, values): (Vec<T>, Vec<f64>) = if self.retrain_from_scratch {
            state
                .scores()
                .iter()
                .map(|(item, score)| (item.clone(), *score))
                .unzip()
        } else {
            state
                .new_scores()
                .iter()
                .map(|(item, score)| (item.clone(), *score))
                .unzip()
        };

        debug!(points = items.len(), "training surrogate model");
        self.model
            .train(&items, &values, self.retrain_from_scratch, featurizer)?;

        state.take_new_scores();
        self.stale = true;
        Ok(true)
    }

    /// Re-predict over the whole pool if the model changed or nothing is cached.
    ///
    /// Returns whether a new cache was built. Variances are requested only
    /// when the acquirer needs them.
    #[instrument(skip_all, fields(stale = self.stale))]
    pub fn maybe_refresh_predictions(&mut self, pool: &dyn Pool<T>) -> Result<bool> {
        if !self.stale && self.cache.is_some() {
            return Ok(false);
        }

        let mean_only = !self.wants_variances;
        let predictions = self
            .model
            .predict(pool.identifiers(), pool.features(), mean_only)?;

        if predictions.means.len() != pool.len() {
            return Err(ExploreError::Model(format!(
                "{} predicted {} means for a pool of {}",
                self.model.name(),
                predictions.means.len(),
                pool.len()
            )));
        }
        if !predictions.variances.is_empty() && predictions.variances.len() != pool.len() {
            return Err(ExploreError::Model(format!(
                "{} predicted {} variances for a pool of {}",
                self.model.name(),
                predictions.variances.len(),
                pool.len()
            )));
        }

        debug!(size = pool.len(), mean_only, "refreshed predictions");
        self.cache = Some(predictions);
        self.stale = false;
        Ok(true)
    }
}
