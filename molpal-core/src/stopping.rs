//! Stopping conditions, checked once after every completed epoch.
//!
//! Exploration stops when any of these holds:
//!
//! - more than `max_epochs` epochs have run
//! - at least `max_explore` inputs have scored
//! - the convergence window is full and the current top-k average is
//!   within a fraction `delta` of the window's moving average
//!
//! Exhausting the pool is deliberately not a stopping condition.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::window::RecentAverages;

/// Budgets and thresholds resolved against the pool size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingCriteria {
    pub max_epochs: usize,
    /// Absolute; already clamped to the pool size
    pub max_explore: usize,
    pub delta: f64,
}

/// Why exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxEpochs,
    MaxExplore,
    Converged,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::MaxEpochs => write!(f, "epoch budget exhausted"),
            StopReason::MaxExplore => write!(f, "exploration budget exhausted"),
            StopReason::Converged => write!(f, "top-k average converged"),
        }
    }
}

/// Evaluate the stopping conditions in order.
///
/// The convergence test only runs once the window is full; until then it
/// can never claim convergence. The ratio
/// `(top_k_avg - moving_avg) / moving_avg` is undefined for a zero moving
/// average and unstable for a negative one. A zero or non-finite ratio
/// input is reported as not converged; negative averages are passed through
/// unchanged.
pub fn check(
    epoch: usize,
    score_count: usize,
    top_k_avg: Option<f64>,
    recent_avgs: &RecentAverages,
    criteria: &StoppingCriteria,
) -> Option<StopReason> {
    if epoch > criteria.max_epochs {
        return Some(StopReason::MaxEpochs);
    }
    if score_count >= criteria.max_explore {
        return Some(StopReason::MaxExplore);
    }

    if !recent_avgs.is_full() {
        return None;
    }

    let (Some(current), Some(moving_avg)) = (top_k_avg, recent_avgs.mean()) else {
        return None;
    };
    if moving_avg == 0.0 || !moving_avg.is_finite() {
        warn!(moving_avg, "moving average unusable for convergence test");
        return None;
    }

    let ratio = (current - moving_avg) / moving_avg;
    if moving_avg < 0.0 {
        warn!(moving_avg, ratio, "convergence ratio with negative moving average");
    }
    (ratio <= criteria.delta).then_some(StopReason::Converged)
}

/// Whether any stopping condition holds.
pub fn is_complete(
    epoch: usize,
    score_count: usize,
    top_k_avg: Option<f64>,
    recent_avgs: &RecentAverages,
    criteria: &StoppingCriteria,
) -> bool {
    check(epoch, score_count, top_k_avg, recent_avgs, criteria).is_some()
}
