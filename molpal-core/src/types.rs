//! Shared value types: identifiers, counts and evaluation results.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ExploreError, Result};

/// Key of a pool candidate.
///
/// Identifiers must round-trip through their `Display`/`FromStr` forms so
/// that score tables can be reloaded.
pub trait Identifier:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + FromStr<Err: fmt::Display>
{
}

impl<T> Identifier for T where
    T: Clone + Eq + Hash + fmt::Debug + fmt::Display + FromStr<Err: fmt::Display>
{
}

/// Objective values for one batch, in evaluation order.
///
/// `None` marks an input whose evaluation produced no usable number.
pub type EvaluationResults<T> = IndexMap<T, Option<f64>>;

/// A number of inputs, given either outright or as a fraction of the pool.
///
/// In TOML an integer (`k = 10`) is absolute and a float (`k = 0.01`) is a
/// fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Absolute(usize),
    Fraction(f64),
}

impl Count {
    /// Resolve to an absolute count against `total`.
    ///
    /// Fractions are floored. The result never exceeds `total`: asking for
    /// more than exists (a fraction above 1 or a count above `total`) means
    /// "all of them", not an error.
    pub fn resolve(self, total: usize) -> usize {
        let n = match self {
            Count::Absolute(n) => n,
            Count::Fraction(f) if f.is_finite() && f > 0.0 => (f * total as f64).floor() as usize,
            Count::Fraction(_) => 0,
        };
        n.min(total)
    }

    /// Reject counts that are not strictly positive.
    pub fn validate(self, name: &str) -> Result<()> {
        let ok = match self {
            Count::Absolute(n) => n > 0,
            Count::Fraction(f) => f.is_finite() && f > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(ExploreError::InvalidConfig(format!(
                "{name}(={self}) must be greater than 0!"
            )))
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Absolute(n) => write!(f, "{n}"),
            Count::Fraction(x) => write!(f, "{x}"),
        }
    }
}

impl From<usize> for Count {
    fn from(n: usize) -> Self {
        Count::Absolute(n)
    }
}

impl From<f64> for Count {
    fn from(f: f64) -> Self {
        Count::Fraction(f)
    }
}
