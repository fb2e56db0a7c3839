//! Error types for molpal-core

use std::path::PathBuf;

use thiserror::Error;

use crate::traits::Capabilities;

/// Error type for exploration operations
#[derive(Debug, Error)]
pub enum ExploreError {
    /// A configured threshold or budget is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The acquirer needs model outputs the model cannot provide
    #[error("{acquirer} acquisition needs {needs:?} but {model} only provides {provides:?}")]
    Incompatible {
        acquirer: String,
        needs: Capabilities,
        model: String,
        provides: Capabilities,
    },

    /// A batch step was requested before the initial round
    #[error("Cannot explore a batch before initialization")]
    Uninitialized,

    /// The initial round was requested after exploration had started
    #[error("Exploration is already initialized")]
    AlreadyInitialized,

    /// Averaging was requested over zero scores
    #[error("Cannot average the top 0 scores")]
    EmptyScores,

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be written
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// A score or prediction table could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A score table is structurally broken (not just an unparsable score)
    #[error("Malformed score table {path}:{line}: {reason}")]
    MalformedTable {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Surrogate model training or prediction failed
    #[error("Model error: {0}")]
    Model(String),

    /// The objective evaluator failed as a whole
    #[error("Objective error: {0}")]
    Objective(String),
}

/// Result type alias for exploration operations
pub type Result<T> = std::result::Result<T, ExploreError>;
