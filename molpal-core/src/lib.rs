//! molpal-core - Batched pool-based Bayesian optimization
//!
//! This crate drives the active-learning loop over a large, fixed pool of
//! candidates: pick a batch, score it with an expensive objective, update a
//! surrogate model, repeat until a budget runs out or the top-k average
//! converges. Featurization, acquisition, modelling and scoring are external
//! collaborators reached through the traits in [`traits`].
//!
//! Exploration state can be persisted as score tables plus a checkpoint and
//! resumed later with the same epoch boundaries.

pub mod config;
pub mod error;
pub mod explorer;
pub mod gate;
pub mod mock;
pub mod persistence;
pub mod state;
pub mod stopping;
pub mod topk;
pub mod traits;
pub mod types;
pub mod window;

pub use config::{ConfigLoader, ExplorerConfig};
pub use error::{ExploreError, Result};
pub use explorer::{Collaborators, EpochSummary, Explorer, Phase, RunSummary};
pub use gate::ModelUpdateGate;
pub use persistence::{Checkpoint, ScoreTable};
pub use state::ExplorationState;
pub use stopping::{StopReason, StoppingCriteria};
pub use traits::{
    Acquirer, BatchRequest, Capabilities, Capability, ExploredSet, Featurizer, InitialRequest,
    Objective, Pool, Predictions, SurrogateModel,
};
pub use types::{Count, EvaluationResults, Identifier};
pub use window::RecentAverages;
