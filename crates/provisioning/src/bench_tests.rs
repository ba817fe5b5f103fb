use super::*;
use std::path::PathBuf;
use std::sync::Mutex;

/// Hands out one scripted sample per lane.
struct ScriptedRunner {
    samples: Mutex<Vec<BenchmarkSample>>,
}

impl ScriptedRunner {
    fn new(samples: &[(u64, u64)]) -> Self {
        Self {
            samples: Mutex::new(
                samples
                    .iter()
                    .map(|&(bench, nps)| BenchmarkSample { bench, nps })
                    .collect(),
            ),
        }
    }
}

impl BenchRunner for ScriptedRunner {
    fn run(&self, _binary: &Path) -> BenchmarkSample {
        self.samples.lock().unwrap().pop().unwrap_or_default()
    }
}

fn engine(expected_bench: u64) -> EngineDescriptor {
    EngineDescriptor {
        id: "7".to_string(),
        name: "Weiss".to_string(),
        commit: "abc123".to_string(),
        source: String::new(),
        expected_bench,
        protocol: "uci".to_string(),
        options: "Threads=1 Hash=32".to_string(),
    }
}

fn binary() -> LocalBinary {
    LocalBinary {
        commit: "abc123".to_string(),
        path: PathBuf::from("Engines/abc123"),
    }
}

#[test]
fn test_consensus_averages_speed() {
    let samples = [
        BenchmarkSample { bench: 23074819, nps: 900000 },
        BenchmarkSample { bench: 23074819, nps: 950000 },
        BenchmarkSample { bench: 23074819, nps: 1000000 },
    ];
    let summary = consensus(&samples);
    assert_eq!(summary.bench, 23074819);
    assert_eq!(summary.nps, 950000.0);
}

#[test]
fn test_disagreeing_lanes_report_zero() {
    let samples = [
        BenchmarkSample { bench: 100, nps: 500 },
        BenchmarkSample { bench: 101, nps: 500 },
    ];
    assert_eq!(consensus(&samples), BenchSummary::INVALID);
    assert_eq!(consensus(&[]), BenchSummary::INVALID);
}

#[test]
fn test_validate_runs_every_lane() {
    let runner = ScriptedRunner::new(&[
        (23074819, 900000),
        (23074819, 950000),
        (23074819, 1000000),
    ]);
    let validator = BenchValidator::new(runner, 3);
    let summary = validator.validate(&binary(), &engine(23074819)).unwrap();
    assert_eq!(summary.nps, 950000.0);
    assert!(validator.runner.samples.lock().unwrap().is_empty());
}

#[test]
fn test_validate_rejects_disagreement() {
    let validator = BenchValidator::new(ScriptedRunner::new(&[(100, 1), (101, 1)]), 2);
    match validator.validate(&binary(), &engine(100)) {
        Err(ConsensusError::Disagreement { mut benches, .. }) => {
            benches.sort_unstable();
            assert_eq!(benches, vec![100, 101]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_failed_lane_breaks_consensus() {
    // the third lane gets no sample and reports (0, 0)
    let validator = BenchValidator::new(ScriptedRunner::new(&[(100, 1), (100, 1)]), 3);
    assert!(matches!(
        validator.validate(&binary(), &engine(100)),
        Err(ConsensusError::Disagreement { .. })
    ));
}

#[test]
fn test_all_lanes_failing_is_not_a_disagreement() {
    let validator = BenchValidator::new(ScriptedRunner::new(&[]), 3);
    assert_eq!(
        validator.validate(&binary(), &engine(100)).unwrap_err(),
        ConsensusError::AllLanesFailed {
            engine: "Weiss".to_string(),
            commit: "abc123".to_string(),
            lanes: 3,
        }
    );
}

#[test]
fn test_validate_rejects_unexpected_bench() {
    let validator = BenchValidator::new(ScriptedRunner::new(&[(4500, 10), (4500, 10)]), 2);
    assert_eq!(
        validator.validate(&binary(), &engine(4501)).unwrap_err(),
        ConsensusError::Mismatch {
            engine: "Weiss".to_string(),
            commit: "abc123".to_string(),
            expected: 4501,
            actual: 4500,
        }
    );
}

#[test]
fn test_parse_bench_output_uses_final_lines() {
    let output = "info depth 13 nodes 120345\n\
                  ===========================\n\
                  Nodes searched  : 4521337\n\
                  Nodes/second    : 1534221\n\n";
    assert_eq!(
        parse_bench_output(output),
        Some(BenchmarkSample { bench: 4521337, nps: 1534221 })
    );
    assert_eq!(parse_bench_output("only one line 5\n"), None);
    assert_eq!(parse_bench_output("Bench: 12 nodes\nNPS: 99\n"), None);
}
