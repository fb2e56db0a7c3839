use std::path::Path;

use tracing::debug;

use super::types::{
    DEFAULT_DELTA, DEFAULT_K, DEFAULT_MAX_EPOCHS, DEFAULT_MAX_EXPLORE, DEFAULT_NAME,
    DEFAULT_SNAPSHOT_SIZE, DEFAULT_SUMMARY_FRACTIONS, DEFAULT_WINDOW_SIZE, ExplorerConfig,
    RawExplorerConfig,
};
use crate::error::Result;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load layered configuration.
    ///
    /// Later files override the fields they set; missing files are skipped.
    /// The merged result is validated.
    pub fn load<P: AsRef<Path>>(layers: &[P]) -> Result<ExplorerConfig> {
        let mut raw = RawExplorerConfig::default();
        for path in layers {
            let path = path.as_ref();
            if !path.exists() {
                debug!(path = %path.display(), "config layer not found, skipping");
                continue;
            }
            let contents = std::fs::read_to_string(path)?;
            let layer: RawExplorerConfig = toml::from_str(&contents)?;
            raw = Self::merge_raw(raw, layer);
        }

        let config = Self::finalize(raw);
        config.validate()?;
        Ok(config)
    }

    /// Load a single file, defaults if it does not exist
    pub fn load_from_path(path: &Path) -> Result<ExplorerConfig> {
        Self::load(&[path])
    }

    /// Parse a config from a TOML string, applying defaults
    pub fn from_toml(contents: &str) -> Result<ExplorerConfig> {
        let raw: RawExplorerConfig = toml::from_str(contents)?;
        let config = Self::finalize(raw);
        config.validate()?;
        Ok(config)
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawExplorerConfig, overlay: RawExplorerConfig) -> RawExplorerConfig {
        RawExplorerConfig {
            name: overlay.name.or(base.name),
            k: overlay.k.or(base.k),
            window_size: overlay.window_size.or(base.window_size),
            delta: overlay.delta.or(base.delta),
            max_epochs: overlay.max_epochs.or(base.max_epochs),
            max_explore: overlay.max_explore.or(base.max_explore),
            root: overlay.root.or(base.root),
            scratch: overlay.scratch.or(base.scratch),
            snapshot_size: overlay.snapshot_size.or(base.snapshot_size),
            write_final: overlay.write_final.or(base.write_final),
            write_intermediate: overlay.write_intermediate.or(base.write_intermediate),
            save_preds: overlay.save_preds.or(base.save_preds),
            retrain_from_scratch: overlay.retrain_from_scratch.or(base.retrain_from_scratch),
            previous_scores: overlay.previous_scores.or(base.previous_scores),
            scores_csvs: overlay.scores_csvs.or(base.scores_csvs),
            checkpoint: overlay.checkpoint.or(base.checkpoint),
            summary_fractions: overlay.summary_fractions.or(base.summary_fractions),
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawExplorerConfig) -> ExplorerConfig {
        ExplorerConfig {
            name: raw.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            k: raw.k.unwrap_or(DEFAULT_K),
            window_size: raw.window_size.unwrap_or(DEFAULT_WINDOW_SIZE),
            delta: raw.delta.unwrap_or(DEFAULT_DELTA),
            max_epochs: raw.max_epochs.unwrap_or(DEFAULT_MAX_EPOCHS),
            max_explore: raw.max_explore.unwrap_or(DEFAULT_MAX_EXPLORE),
            root: raw.root.unwrap_or_else(|| ".".into()),
            scratch: raw.scratch,
            snapshot_size: raw.snapshot_size.unwrap_or(DEFAULT_SNAPSHOT_SIZE),
            write_final: raw.write_final.unwrap_or(true),
            write_intermediate: raw.write_intermediate.unwrap_or(false),
            save_preds: raw.save_preds.unwrap_or(false),
            retrain_from_scratch: raw.retrain_from_scratch.unwrap_or(false),
            previous_scores: raw.previous_scores,
            scores_csvs: raw.scores_csvs.unwrap_or_default(),
            checkpoint: raw.checkpoint,
            summary_fractions: raw
                .summary_fractions
                .unwrap_or_else(|| DEFAULT_SUMMARY_FRACTIONS.to_vec()),
        }
    }

    /// Save config to a specific path
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to_path(config: &ExplorerConfig, path: &Path) -> Result<()> {
        molpal_paths::ensure_parent(path)?;
        let toml = toml::to_string_pretty(config)?;
        std::fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExploreError;
    use crate::types::Count;
    use tempfile::TempDir;

    // ==================== Load Tests ====================

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from_path(&temp_dir.path().join("none.toml")).unwrap();
        assert_eq!(config, ExplorerConfig::default());
    }

    #[test]
    fn test_integer_and_float_counts() {
        let config = ConfigLoader::from_toml("k = 25\nmax_explore = 0.1\n").unwrap();
        assert_eq!(config.k, Count::Absolute(25));
        assert_eq!(config.max_explore, Count::Fraction(0.1));
    }

    #[test]
    fn test_invalid_values_fail_on_load() {
        let err = ConfigLoader::from_toml("k = 0").unwrap_err();
        assert!(matches!(err, ExploreError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = ConfigLoader::from_toml("k = [").unwrap_err();
        assert!(matches!(err, ExploreError::ConfigParse(_)));
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_overlay_overrides_only_explicit_fields() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("base.toml");
        let overlay = temp_dir.path().join("overlay.toml");
        std::fs::write(&base, "name = \"dock\"\nk = 10\nwindow_size = 5\n").unwrap();
        std::fs::write(&overlay, "k = 0.05\nwrite_intermediate = true\n").unwrap();

        let config = ConfigLoader::load(&[&base, &overlay]).unwrap();
        assert_eq!(config.name, "dock");
        assert_eq!(config.k, Count::Fraction(0.05));
        assert_eq!(config.window_size, 5);
        assert!(config.write_intermediate);
        assert!(config.write_final);
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("present.toml");
        std::fs::write(&present, "max_epochs = 7\n").unwrap();

        let config =
            ConfigLoader::load(&[temp_dir.path().join("absent.toml"), present]).unwrap();
        assert_eq!(config.max_epochs, 7);
    }

    // ==================== Save Tests ====================

    #[test]
    fn test_save_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("deep").join("molpal.toml");

        ConfigLoader::save_to_path(&ExplorerConfig::default(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("molpal.toml");

        let config = ExplorerConfig {
            name: "screen".to_string(),
            k: Count::Absolute(100),
            retrain_from_scratch: true,
            checkpoint: Some("runs/screen/states/epoch_3.json".into()),
            ..Default::default()
        };
        ConfigLoader::save_to_path(&config, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("k = 100"));
        assert!(contents.contains("retrain_from_scratch = true"));
        assert_eq!(ConfigLoader::load_from_path(&path).unwrap(), config);
    }
}
