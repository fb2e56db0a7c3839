//! Shared test utilities for molpal-core integration tests

use std::path::Path;

use molpal_core::mock::{MockAcquirer, MockFeaturizer, MockModel, MockObjective, MockPool};
use molpal_core::{Collaborators, Count, Explorer, ExplorerConfig, Result};

/// Handles onto the mocks an explorer was built with
#[allow(dead_code)]
pub struct Probes {
    pub acquirer: MockAcquirer,
    pub model: MockModel<String>,
    pub objective: MockObjective<String>,
}

/// A pool of `n` inputs `x0..x{n-1}`; `x0` scores 10, `x1` scores 9 and
/// every other input scores 1, except multiples of 7 (after `x0`), which fail.
pub fn landscape(n: usize) -> Vec<(String, Option<f64>)> {
    (0..n)
        .map(|i| {
            let score = match i {
                0 => Some(10.0),
                1 => Some(9.0),
                i if i % 7 == 0 => None,
                _ => Some(1.0),
            };
            (format!("x{i}"), score)
        })
        .collect()
}

/// Config writing under `root` with scratch space inside it
pub fn config(root: &Path) -> ExplorerConfig {
    ExplorerConfig {
        root: root.to_path_buf(),
        scratch: Some(root.join("scratch")),
        k: Count::Absolute(2),
        write_final: false,
        ..Default::default()
    }
}

/// Build an explorer over `table` with a greedy acquirer
pub fn build(
    table: &[(String, Option<f64>)],
    config: ExplorerConfig,
    init_size: usize,
    batch_size: usize,
) -> (Explorer<String>, Probes) {
    try_build(table, config, init_size, batch_size).unwrap()
}

/// Like [`build`], surfacing construction errors
pub fn try_build(
    table: &[(String, Option<f64>)],
    config: ExplorerConfig,
    init_size: usize,
    batch_size: usize,
) -> Result<(Explorer<String>, Probes)> {
    let acquirer = MockAcquirer::new(init_size, batch_size);
    let model = MockModel::new();
    let objective = MockObjective::new(table.iter().cloned().collect());
    let pool = MockPool::new(table.iter().map(|(id, _)| id.clone()).collect());

    let explorer = Explorer::new(
        config,
        Collaborators {
            pool: Box::new(pool),
            featurizer: Box::new(MockFeaturizer),
            acquirer: Box::new(acquirer.clone()),
            model: Box::new(model.clone()),
            objective: Box::new(objective.clone()),
        },
    )?;

    Ok((
        explorer,
        Probes {
            acquirer,
            model,
            objective,
        },
    ))
}
