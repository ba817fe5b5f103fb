//! Benchmark validation.
//!
//! Every engine supports a `bench` command that searches a fixed set of
//! positions and prints the node count and speed as its final two lines. The
//! node count is deterministic for a given build, so running it on several
//! lanes at once both verifies the build (all lanes must agree, and match the
//! count declared by the coordinator) and measures this machine's speed under
//! full load.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use worker_core::EngineDescriptor;

use crate::error::ConsensusError;
use crate::provisioner::LocalBinary;

/// Output of one `bench` lane. `(0, 0)` marks a lane that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BenchmarkSample {
    pub bench: u64,
    pub nps: u64,
}

/// Aggregate over all lanes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchSummary {
    pub bench: u64,
    /// Mean nodes per second across lanes
    pub nps: f64,
}

impl BenchSummary {
    /// Reported when the lanes could not agree.
    pub const INVALID: BenchSummary = BenchSummary { bench: 0, nps: 0.0 };

    pub fn is_valid(&self) -> bool {
        self.bench != 0
    }
}

/// Runs one benchmark lane. Never fails: problems come back as `(0, 0)`.
pub trait BenchRunner {
    fn run(&self, binary: &Path) -> BenchmarkSample;
}

/// Spawns `<binary> bench` and parses its output.
#[derive(Debug, Clone)]
pub struct ProcessBenchRunner {
    timeout: Duration,
}

impl ProcessBenchRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn try_run(&self, binary: &Path) -> Result<BenchmarkSample, String> {
        let mut child = Command::new(binary)
            .arg("bench")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start: {}", e))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {:?}", self.timeout));
                }
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(e) => return Err(format!("failed to wait: {}", e)),
            }
        }

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        parse_bench_output(&stdout)
            .or_else(|| parse_bench_output(&stderr))
            .ok_or_else(|| "unparsable bench output".to_string())
    }
}

impl BenchRunner for ProcessBenchRunner {
    fn run(&self, binary: &Path) -> BenchmarkSample {
        self.try_run(binary).unwrap_or_else(|reason| {
            warn!(binary = %binary.display(), %reason, "bench lane failed");
            BenchmarkSample::default()
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Parse the last whitespace token of the final two non-empty lines as
/// `(bench, nps)`.
pub fn parse_bench_output(output: &str) -> Option<BenchmarkSample> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty()).rev();
    let nps_line = lines.next()?;
    let bench_line = lines.next()?;
    let last_token = |line: &str| line.split_whitespace().last()?.parse::<u64>().ok();
    Some(BenchmarkSample {
        bench: last_token(bench_line)?,
        nps: last_token(nps_line)?,
    })
}

/// Combine lane samples. Lanes that disagree on the node count, or an empty
/// set, yield [`BenchSummary::INVALID`].
pub fn consensus(samples: &[BenchmarkSample]) -> BenchSummary {
    let benches: BTreeSet<u64> = samples.iter().map(|s| s.bench).collect();
    if benches.len() != 1 {
        return BenchSummary::INVALID;
    }
    let total: f64 = samples.iter().map(|s| s.nps as f64).sum();
    BenchSummary {
        bench: samples[0].bench,
        nps: total / samples.len() as f64,
    }
}

/// Runs `bench` on several lanes and checks the result against the
/// coordinator's expectation.
pub struct BenchValidator<R: BenchRunner + Sync = ProcessBenchRunner> {
    runner: R,
    lanes: usize,
}

impl<R: BenchRunner + Sync> BenchValidator<R> {
    pub fn new(runner: R, lanes: usize) -> Self {
        Self {
            runner,
            lanes: lanes.max(1),
        }
    }

    /// One sample per lane. Every lane is joined, even if siblings failed.
    pub fn measure(&self, binary: &Path) -> Vec<BenchmarkSample> {
        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.lanes)
                .map(|_| scope.spawn(|| self.runner.run(binary)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_default())
                .collect()
        })
    }

    pub fn validate(
        &self,
        binary: &LocalBinary,
        engine: &EngineDescriptor,
    ) -> Result<BenchSummary, ConsensusError> {
        info!(engine = %engine.name, lanes = self.lanes, "running benchmarks");
        let samples = self.measure(&binary.path);
        let summary = consensus(&samples);

        if samples.iter().all(|s| *s == BenchmarkSample::default()) {
            let err = ConsensusError::AllLanesFailed {
                engine: engine.name.clone(),
                commit: engine.commit.clone(),
                lanes: samples.len(),
            };
            error!(%err, "bench failed");
            return Err(err);
        }

        if !summary.is_valid() {
            let benches = samples.iter().map(|s| s.bench).collect();
            let err = ConsensusError::Disagreement {
                engine: engine.name.clone(),
                commit: engine.commit.clone(),
                benches,
            };
            error!(%err, "bench consensus failed");
            return Err(err);
        }

        info!(engine = %engine.name, bench = summary.bench, nps = summary.nps as u64, "bench complete");

        if summary.bench != engine.expected_bench {
            let err = ConsensusError::Mismatch {
                engine: engine.name.clone(),
                commit: engine.commit.clone(),
                expected: engine.expected_bench,
                actual: summary.bench,
            };
            error!(%err, "bench mismatch");
            return Err(err);
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[path = "bench_tests.rs"]
mod bench_tests;
