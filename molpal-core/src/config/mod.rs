//! Explorer configuration
//!
//! Settings are read from one or more TOML files; later layers override the
//! fields they set.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    DEFAULT_DELTA, DEFAULT_K, DEFAULT_MAX_EPOCHS, DEFAULT_MAX_EXPLORE, DEFAULT_NAME,
    DEFAULT_SNAPSHOT_SIZE, DEFAULT_SUMMARY_FRACTIONS, DEFAULT_WINDOW_SIZE, ExplorerConfig,
    RawExplorerConfig,
};
