//! Directory layout for molpal exploration runs.
//!
//! Every run is identified by a name and writes under `<root>/<name>/`:
//!
//! ```text
//! <root>/<name>/data/    score tables (intermediate and final)
//! <root>/<name>/states/  checkpoint files
//! <root>/<name>/preds/   prediction snapshots
//! ```
//!
//! Objective evaluators additionally receive scratch locations under the
//! system temp directory, one pair per epoch.

use std::path::{Path, PathBuf};

/// File name of the final table of every explored input.
pub const FINAL_SCORES_FILE: &str = "all_explored_final.csv";

/// Input/output location hints handed to an objective evaluator for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPaths {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Paths for a single named exploration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    root: PathBuf,
    name: String,
    scratch: PathBuf,
}

impl RunPaths {
    /// Layout rooted at `root`, with scratch space in the system temp dir.
    ///
    /// # Examples
    ///
    /// ```
    /// use molpal_paths::RunPaths;
    ///
    /// let paths = RunPaths::new(".", "molpal");
    /// assert!(paths.data_dir().ends_with("molpal/data"));
    /// ```
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::with_scratch(root, name, std::env::temp_dir())
    }

    /// Layout with an explicit scratch directory.
    pub fn with_scratch(
        root: impl Into<PathBuf>,
        name: impl Into<String>,
        scratch: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            scratch: scratch.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>`
    pub fn run_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    /// `<root>/<name>/data`
    pub fn data_dir(&self) -> PathBuf {
        self.run_dir().join("data")
    }

    /// `<root>/<name>/states`
    pub fn states_dir(&self) -> PathBuf {
        self.run_dir().join("states")
    }

    /// `<root>/<name>/preds`
    pub fn preds_dir(&self) -> PathBuf {
        self.run_dir().join("preds")
    }

    /// Score table holding the top `m` explored inputs after `epoch`.
    pub fn scores_file(&self, m: usize, epoch: usize) -> PathBuf {
        self.data_dir().join(format!("top_{m}_explored_iter_{epoch}.csv"))
    }

    /// Score table written once exploration has finished.
    pub fn final_scores_file(&self) -> PathBuf {
        self.data_dir().join(FINAL_SCORES_FILE)
    }

    /// Checkpoint listing every score table written up to `epoch`.
    pub fn checkpoint_file(&self, epoch: usize) -> PathBuf {
        self.states_dir().join(format!("epoch_{epoch}.json"))
    }

    /// Predictions over the whole pool made during `epoch`.
    pub fn predictions_file(&self, epoch: usize) -> PathBuf {
        self.preds_dir().join(format!("preds_iter_{epoch}.csv"))
    }

    /// Scratch locations for the objective evaluation of `epoch`.
    pub fn batch(&self, epoch: usize) -> BatchPaths {
        let base = self.scratch.join(&self.name);
        BatchPaths {
            input: base.join("inputs").join(format!("iter_{epoch}")),
            output: base.join("outputs").join(format!("iter_{epoch}")),
        }
    }
}

/// Create `path`'s parent directory (and its ancestors) if missing.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
