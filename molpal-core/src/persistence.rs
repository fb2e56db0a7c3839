//! Score tables, prediction snapshots and checkpoint files.
//!
//! Score tables are CSV with a header row `identifier,score`. A failed
//! input is written with an empty score cell. When reading, a score cell
//! that does not parse as a finite number makes that row a failure instead
//! of aborting the load.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::{IndexMap, IndexSet};
use molpal_paths::ensure_parent;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ExploreError, Result};
use crate::types::Identifier;

pub const SCORES_HEADER: [&str; 2] = ["identifier", "score"];
pub const PREDICTIONS_HEADER: [&str; 3] = ["identifier", "predicted_score", "predicted_variance"];

/// Contents of one score table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable<T: Identifier> {
    pub scores: IndexMap<T, f64>,
    pub failures: IndexSet<T>,
}

impl<T: Identifier> Default for ScoreTable<T> {
    fn default() -> Self {
        Self {
            scores: IndexMap::new(),
            failures: IndexSet::new(),
        }
    }
}

impl<T: Identifier> ScoreTable<T> {
    pub fn len(&self) -> usize {
        self.scores.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.failures.is_empty()
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    ensure_parent(path)?;
    Ok(WriterBuilder::new().from_writer(fs::File::create(path)?))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write `(identifier, score)` rows; `None` scores are written as empty cells.
pub fn write_scores<'a, T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Display + 'a,
    I: IntoIterator<Item = (&'a T, Option<f64>)>,
{
    let mut writer = create_writer(path)?;
    writer.write_record(SCORES_HEADER)?;
    let mut count = 0usize;
    for (item, score) in rows {
        writer.write_record([item.to_string(), cell(score)])?;
        count += 1;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = count, "wrote score table");
    Ok(())
}

/// Read a score table written by [`write_scores`] (or any table whose first
/// two columns are an identifier and a score, under a header row).
///
/// Columns after the second are ignored. An identifier that fails to parse
/// or a missing header is a [`ExploreError::MalformedTable`].
pub fn read_scores<T: Identifier>(path: &Path) -> Result<ScoreTable<T>> {
    let file = fs::File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let malformed = |line: u64, reason: String| ExploreError::MalformedTable {
        path: path.to_path_buf(),
        line: line as usize,
        reason,
    };
    let structural = |err: csv::Error| {
        if err.is_io_error() {
            return ExploreError::Io(io::Error::from(err));
        }
        let line = err.position().map_or(0, |pos| pos.line());
        malformed(line, err.to_string())
    };

    if reader.headers().map_err(structural)?.is_empty() {
        return Err(malformed(1, "missing header".to_string()));
    }

    let mut table = ScoreTable::default();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record).map_err(structural)? {
        let line = record.position().map_or(0, |pos| pos.line());
        let raw_id = record.get(0).unwrap_or_default();
        let item: T = raw_id
            .parse()
            .map_err(|e| malformed(line, format!("bad identifier {raw_id:?}: {e}")))?;

        let score = record
            .get(1)
            .and_then(|cell| cell.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite());

        match score {
            Some(score) => {
                table.failures.shift_remove(&item);
                table.scores.insert(item, score);
            }
            None if table.scores.contains_key(&item) => {}
            None => {
                trace!(line, "row without a usable score");
                table.failures.insert(item);
            }
        }
    }

    debug!(
        path = %path.display(),
        scores = table.scores.len(),
        failures = table.failures.len(),
        "read score table"
    );
    Ok(table)
}

/// Write predictions over the pool.
///
/// Rows are zipped longest-first: a missing mean or variance leaves its
/// cell empty.
pub fn write_predictions<T: Display>(
    path: &Path,
    identifiers: &[T],
    means: &[f64],
    variances: &[f64],
) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(PREDICTIONS_HEADER)?;

    let rows = identifiers.len().max(means.len()).max(variances.len());
    for i in 0..rows {
        let id = identifiers
            .get(i)
            .map(ToString::to_string)
            .unwrap_or_default();
        writer.write_record([
            id,
            cell(means.get(i).copied()),
            cell(variances.get(i).copied()),
        ])?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows, "wrote predictions");
    Ok(())
}

/// A resumable record of a run: the score tables written so far, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Run name
    pub name: String,

    /// Epoch at which the checkpoint was taken
    pub epoch: usize,

    /// When the checkpoint was written
    pub created_at: DateTime<Utc>,

    /// Score tables, one per persisted epoch, in epoch order
    pub snapshots: Vec<PathBuf>,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, epoch: usize, snapshots: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            epoch,
            created_at: Utc::now(),
            snapshots,
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    // ==================== Score table Tests ====================

    #[test]
    fn test_write_then_read_scores_and_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("scores.csv");
        let a = "CCO".to_string();
        let b = "c1ccccc1".to_string();
        write_scores(&path, [(&a, Some(-7.5)), (&b, None)]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "identifier,score\nCCO,-7.5\nc1ccccc1,\n");

        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert_eq!(table.scores["CCO"], -7.5);
        assert!(table.failures.contains("c1ccccc1"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unparsable_scores_become_failures() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "lenient.csv",
            "smiles,score\nA,1.5\nB,oops\nC\nD,nan\nE,inf\nF, 2.0 \n",
        );
        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert_eq!(table.scores.len(), 2);
        assert_eq!(table.scores["F"], 2.0);
        let failures: Vec<&str> = table.failures.iter().map(String::as_str).collect();
        assert_eq!(failures, vec!["B", "C", "D", "E"]);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wide.csv", "identifier,score,extra\nA,3.0,x\n");
        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert_eq!(table.scores["A"], 3.0);
    }

    #[test]
    fn test_quoted_identifiers_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quoted.csv");
        let odd = "a,\"b\"".to_string();
        write_scores(&path, [(&odd, Some(1.0))]).unwrap();

        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert_eq!(table.scores.get(&odd), Some(&1.0));
    }

    #[test]
    fn test_multiline_identifiers_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("multiline.csv");
        let odd = "a\nb".to_string();
        let plain = "c".to_string();
        write_scores(&path, [(&odd, Some(1.0)), (&plain, None)]).unwrap();

        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert_eq!(table.scores.get(&odd), Some(&1.0));
        assert!(table.failures.contains("c"));
    }

    #[test]
    fn test_bad_identifier_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ints.csv", "identifier,score\n1,0.5\nxyz,0.7\n");
        let err = read_scores::<u32>(&path).unwrap_err();
        assert!(matches!(err, ExploreError::MalformedTable { line: 3, .. }));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.csv", "");
        assert!(matches!(
            read_scores::<String>(&path),
            Err(ExploreError::MalformedTable { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_scores::<String>(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, ExploreError::Io(_)));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "header.csv", "identifier,score\n");
        let table: ScoreTable<String> = read_scores(&path).unwrap();
        assert!(table.is_empty());
    }

    // ==================== Prediction Tests ====================

    #[test]
    fn test_predictions_zip_longest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preds").join("preds_iter_1.csv");
        let ids = vec!["A".to_string(), "B".to_string()];
        write_predictions(&path, &ids, &[1.5, 2.0], &[]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "identifier,predicted_score,predicted_variance\nA,1.5,\nB,2,\n"
        );
    }

    // ==================== Checkpoint Tests ====================

    #[test]
    fn test_checkpoint_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("states").join("epoch_2.json");
        let checkpoint = Checkpoint::new(
            "dock",
            2,
            vec!["data/top_5_explored_iter_1.csv".into(), "data/top_9_explored_iter_2.csv".into()],
        );
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"snapshots\""));
        assert!(raw.contains("\"created_at\""));
    }

    #[test]
    fn test_checkpoint_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.json", "not json");
        assert!(matches!(Checkpoint::load(&path), Err(ExploreError::Json(_))));
    }
}
