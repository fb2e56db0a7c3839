//! Checkpoint and resume across explorer instances

mod common;

use indexmap::{IndexMap, IndexSet};
use molpal_core::{Checkpoint, ExploreError, Explorer, Phase, RecentAverages};
use tempfile::TempDir;

use common::{build, config, landscape, try_build};

struct Boundary {
    epoch: usize,
    scores: IndexMap<String, f64>,
    failures: IndexSet<String>,
    top_k_avg: Option<f64>,
    window: RecentAverages,
}

impl Boundary {
    fn of(explorer: &Explorer<String>) -> Self {
        Self {
            epoch: explorer.epoch(),
            scores: explorer.state().scores().clone(),
            failures: explorer.state().failures().clone(),
            top_k_avg: explorer.top_k_avg(),
            window: explorer.state().recent_avgs().clone(),
        }
    }
}

#[test]
fn test_replay_matches_every_epoch_boundary() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    cfg.write_intermediate = true;
    // 12 inputs: 3 seeded, then 4, 4 and 1; the last three rounds find the pool exhausted
    let (mut original, _) = build(&landscape(12), cfg, 3, 4);

    original.explore_initial().unwrap();
    let mut boundaries = vec![Boundary::of(&original)];
    for _ in 0..6 {
        original.explore_batch().unwrap();
        boundaries.push(Boundary::of(&original));
    }
    let snapshots = original.snapshots().to_vec();
    assert_eq!(snapshots.len(), 7);
    assert_eq!(original.len(), 12);

    for (n, boundary) in boundaries.iter().enumerate() {
        let mut cfg = config(dir.path());
        cfg.name = format!("replay-{n}");
        cfg.scores_csvs = snapshots[..=n].to_vec();
        let (resumed, _) = build(&landscape(12), cfg, 3, 4);

        assert_eq!(resumed.epoch(), boundary.epoch, "prefix {n}");
        assert_eq!(resumed.state().scores(), &boundary.scores, "prefix {n}");
        assert_eq!(resumed.state().failures(), &boundary.failures, "prefix {n}");
        assert_eq!(resumed.top_k_avg(), boundary.top_k_avg, "prefix {n}");
        assert_eq!(resumed.state().recent_avgs(), &boundary.window, "prefix {n}");
        assert_eq!(resumed.phase(), Phase::SteadyState);
    }
}

#[test]
fn test_exhausted_rounds_are_checkpointed() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    cfg.write_intermediate = true;
    let (mut original, _) = build(&landscape(4), cfg, 4, 1);

    original.explore_initial().unwrap();
    original.explore_batch().unwrap();
    original.explore_batch().unwrap();
    assert_eq!(original.epoch(), 3);
    assert_eq!(original.snapshots().len(), 3);

    let checkpoint = original.paths().checkpoint_file(3);
    assert_eq!(Checkpoint::load(&checkpoint).unwrap().epoch, 3);

    let mut cfg = config(dir.path());
    cfg.name = "resumed".to_string();
    cfg.checkpoint = Some(checkpoint);
    let (resumed, probes) = build(&landscape(4), cfg, 4, 1);

    assert_eq!(resumed.epoch(), 3);
    assert_eq!(resumed.state().recent_avgs(), original.state().recent_avgs());
    assert_eq!(resumed.stop_reason(), original.stop_reason());
    assert_eq!(probes.model.train_calls().len(), 1);
}

#[test]
fn test_resumed_run_finishes_like_uninterrupted_run() {
    let dir = TempDir::new().unwrap();

    let mut straight_cfg = config(dir.path());
    straight_cfg.name = "straight".to_string();
    let (mut straight, _) = build(&landscape(40), straight_cfg, 4, 3);
    let expected = straight.run().unwrap();

    let mut first_cfg = config(dir.path());
    first_cfg.name = "interrupted".to_string();
    first_cfg.write_intermediate = true;
    let (mut first, _) = build(&landscape(40), first_cfg, 4, 3);
    first.explore_initial().unwrap();
    first.explore_batch().unwrap();
    let checkpoint = first.save_checkpoint().unwrap();
    drop(first);

    let mut second_cfg = config(dir.path());
    second_cfg.name = "interrupted".to_string();
    second_cfg.checkpoint = Some(checkpoint);
    let (mut second, probes) = build(&landscape(40), second_cfg, 4, 3);
    assert_eq!(second.epoch(), 2);
    assert_eq!(probes.model.train_calls().len(), 2);

    let resumed = second.run().unwrap();
    assert_eq!(probes.acquirer.initial_calls(), 0);
    assert_eq!(resumed.stop_reason, expected.stop_reason);
    assert_eq!(resumed.epochs, expected.epochs);
    assert_eq!(resumed.explored, expected.explored);
    assert_eq!(resumed.top_k_avg, expected.top_k_avg);
    assert_eq!(second.state().scores(), straight.state().scores());
}

#[test]
fn test_previous_scores_seed_a_fresh_run() {
    let dir = TempDir::new().unwrap();
    let prev = dir.path().join("previous.csv");
    std::fs::write(&prev, "identifier,score\nx0,10.0\nx1,9.0\nx7,failed\n").unwrap();

    let mut cfg = config(dir.path());
    cfg.previous_scores = Some(prev);
    let (mut explorer, probes) = build(&landscape(20), cfg, 4, 2);
    assert_eq!(explorer.epoch(), 1);
    assert_eq!(explorer.len(), 3);

    let summary = explorer.run().unwrap();
    assert_eq!(probes.acquirer.initial_calls(), 0);
    assert_eq!(probes.model.train_calls()[0].items.len(), 2);
    assert_eq!(summary.top_k_avg, Some(9.5));
}

#[test]
fn test_corrupt_snapshot_fails_resume() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "").unwrap();

    let mut cfg = config(dir.path());
    cfg.scores_csvs = vec![bad];
    let result = try_build(&landscape(5), cfg, 1, 1);
    assert!(matches!(result, Err(ExploreError::MalformedTable { .. })));
}

#[test]
fn test_missing_snapshot_fails_resume() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    cfg.scores_csvs = vec![dir.path().join("gone.csv")];
    let result = try_build(&landscape(5), cfg, 1, 1);
    assert!(matches!(result, Err(ExploreError::Io(_))));
}
