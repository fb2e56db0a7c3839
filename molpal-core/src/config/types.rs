use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExploreError, Result};
use crate::types::Count;

/// Default run name, also the output subdirectory
pub const DEFAULT_NAME: &str = "molpal";

/// Default top-k size: 1% of the pool
pub const DEFAULT_K: Count = Count::Fraction(0.01);

/// Default length of the convergence window
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Default convergence tolerance
pub const DEFAULT_DELTA: f64 = 0.01;

pub const DEFAULT_MAX_EPOCHS: usize = 50;

/// Default exploration budget: the whole pool
pub const DEFAULT_MAX_EXPLORE: Count = Count::Fraction(1.0);

/// Default size of intermediate snapshots: every explored input
pub const DEFAULT_SNAPSHOT_SIZE: Count = Count::Fraction(1.0);

/// Fractions of the pool reported in the final summary
pub const DEFAULT_SUMMARY_FRACTIONS: [f64; 4] = [0.0001, 0.0005, 0.001, 0.005];

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawExplorerConfig {
    pub name: Option<String>,
    pub k: Option<Count>,
    pub window_size: Option<usize>,
    pub delta: Option<f64>,
    pub max_epochs: Option<usize>,
    pub max_explore: Option<Count>,
    pub root: Option<PathBuf>,
    pub scratch: Option<PathBuf>,
    pub snapshot_size: Option<Count>,
    pub write_final: Option<bool>,
    pub write_intermediate: Option<bool>,
    pub save_preds: Option<bool>,
    pub retrain_from_scratch: Option<bool>,
    pub previous_scores: Option<PathBuf>,
    pub scores_csvs: Option<Vec<PathBuf>>,
    pub checkpoint: Option<PathBuf>,
    pub summary_fractions: Option<Vec<f64>>,
}

/// Final explorer configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Run name; outputs go to `<root>/<name>/`
    pub name: String,

    /// Number of top inputs whose average is tracked
    pub k: Count,

    /// Number of recent top-k averages in the convergence window
    pub window_size: usize,

    /// Relative improvement below which exploration has converged
    pub delta: f64,

    pub max_epochs: usize,

    /// Exploration budget, absolute or as a fraction of the pool
    pub max_explore: Count,

    /// Output root directory
    pub root: PathBuf,

    /// Base directory for objective scratch files (system temp dir if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch: Option<PathBuf>,

    /// Inputs per intermediate snapshot, fraction of explored inputs
    pub snapshot_size: Count,

    /// Write every explored input once exploration stops
    pub write_final: bool,

    /// Write a snapshot (and checkpoint) after every epoch
    pub write_intermediate: bool,

    /// Write pool predictions after every refresh
    pub save_preds: bool,

    /// Train on all scores each update instead of only new ones
    pub retrain_from_scratch: bool,

    /// Score table used as the initialization batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_scores: Option<PathBuf>,

    /// Snapshots to replay, in epoch order
    #[serde(default)]
    pub scores_csvs: Vec<PathBuf>,

    /// Checkpoint file to resume from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PathBuf>,

    /// Pool fractions at which the final summary reports top-k averages
    pub summary_fractions: Vec<f64>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            k: DEFAULT_K,
            window_size: DEFAULT_WINDOW_SIZE,
            delta: DEFAULT_DELTA,
            max_epochs: DEFAULT_MAX_EPOCHS,
            max_explore: DEFAULT_MAX_EXPLORE,
            root: PathBuf::from("."),
            scratch: None,
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
            write_final: true,
            write_intermediate: false,
            save_preds: false,
            retrain_from_scratch: false,
            previous_scores: None,
            scores_csvs: Vec::new(),
            checkpoint: None,
            summary_fractions: DEFAULT_SUMMARY_FRACTIONS.to_vec(),
        }
    }
}

impl ExplorerConfig {
    /// Reject thresholds and budgets that can never produce a sensible run.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ExploreError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }
        self.k.validate("k")?;
        self.max_explore.validate("max_explore")?;
        self.snapshot_size.validate("snapshot_size")?;
        if self.window_size == 0 {
            return Err(ExploreError::InvalidConfig(
                "window_size(=0) must be greater than 0!".to_string(),
            ));
        }
        if !self.delta.is_finite() {
            return Err(ExploreError::InvalidConfig(format!(
                "delta(={}) must be finite",
                self.delta
            )));
        }
        if let Some(bad) = self
            .summary_fractions
            .iter()
            .find(|f| !f.is_finite() || **f < 0.0)
        {
            return Err(ExploreError::InvalidConfig(format!(
                "summary fraction {bad} must be a non-negative number"
            )));
        }
        Ok(())
    }
}
