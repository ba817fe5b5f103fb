//! Whole workloads against fake collaborators and a shell-script runner.
#![cfg(unix)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use coordinator::{Coordinator, CoordinatorError, ReportStatus, ResultReport, WorkloadReply, WorkloadRequest};
use provisioning::{
    ArchiveFetcher, BenchRunner, BenchValidator, BenchmarkSample, BuildEngine, BuildRequest, ConsensusError,
    Downloader, Provisioner, ProvisioningError,
};
use sha2::{Digest, Sha256};
use worker::{WorkloadError, WorkloadOutcome, WorkloadPipeline};
use worker_core::{
    Assignment, EngineDescriptor, OpeningBook, ResultDelta, Score, TestSpec, WorkerConfig, Workload,
};

const BENCH: u64 = 23_074_819;
const BOOK: &[u8] = b"1. e4 e5 *\n";

#[derive(Default)]
struct FakeCoordinator {
    replies: RefCell<VecDeque<ReportStatus>>,
    reports: RefCell<Vec<(String, String, String, ResultDelta)>>,
    nps: RefCell<Vec<(String, f64)>>,
    wrong_benches: RefCell<Vec<(String, String)>>,
}

impl Coordinator for FakeCoordinator {
    fn request_workload(&self, _: &WorkloadRequest) -> Result<WorkloadReply, CoordinatorError> {
        Ok(WorkloadReply::NoWork)
    }

    fn submit_results(&self, report: &ResultReport<'_>) -> ReportStatus {
        self.reports.borrow_mut().push((
            report.machine_id.to_string(),
            report.result_id.to_string(),
            report.test_id.to_string(),
            report.delta,
        ));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(ReportStatus::Acknowledged)
    }

    fn submit_nps(&self, machine_id: &str, nps: f64) {
        self.nps.borrow_mut().push((machine_id.to_string(), nps));
    }

    fn wrong_bench(&self, test_id: &str, engine_id: &str) {
        self.wrong_benches
            .borrow_mut()
            .push((test_id.to_string(), engine_id.to_string()));
    }

    fn runner_files_url(&self) -> Result<String, CoordinatorError> {
        Ok("http://files.example/".to_string())
    }
}

/// Lays out `<repo>-<ref>/src` like a source archive would.
struct TreeFetcher;

impl ArchiveFetcher for TreeFetcher {
    fn fetch(&self, _source: &str, dest: &Path) -> Result<(), ProvisioningError> {
        let src = dest.join("Ethereal-main").join("src");
        fs::create_dir_all(&src).map_err(|source| ProvisioningError::Extract {
            url: "fake".to_string(),
            source,
        })
    }
}

struct TouchBuilder;

impl BuildEngine for TouchBuilder {
    fn build(&self, request: &BuildRequest<'_>) -> Result<(), ProvisioningError> {
        fs::write(request.dir.join(request.exe_name), b"engine").map_err(|source| ProvisioningError::Build {
            engine: request.exe_name.to_string(),
            dir: request.dir.to_path_buf(),
            source,
        })
    }
}

struct NoDownloads;

impl Downloader for NoDownloads {
    fn download(&self, url: &str) -> Result<Vec<u8>, ProvisioningError> {
        Err(ProvisioningError::DownloadStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Every lane reports the same fixed sample, except for binaries listed in
/// `broken`, which report a different node count.
struct FixedBench {
    broken: Vec<String>,
}

impl BenchRunner for FixedBench {
    fn run(&self, binary: &Path) -> BenchmarkSample {
        let commit = binary.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let bench = if self.broken.contains(&commit) { BENCH + 1 } else { BENCH };
        BenchmarkSample { bench, nps: 500_000 }
    }
}

fn engine(id: &str, commit: &str) -> EngineDescriptor {
    EngineDescriptor {
        id: id.to_string(),
        name: "Ethereal".to_string(),
        commit: commit.to_string(),
        source: "https://github.com/AndyGrant/Ethereal/archive/main.zip".to_string(),
        expected_bench: BENCH,
        protocol: "uci".to_string(),
        options: "Threads=1 Hash=8".to_string(),
    }
}

fn workload() -> Workload {
    Workload {
        machine: Assignment { id: "3".to_string() },
        result: Assignment { id: "41".to_string() },
        test: TestSpec {
            id: "17".to_string(),
            engine: "Ethereal".to_string(),
            baseline_nps: 1_000_000,
            time_control: "40/60+0.5".to_string(),
            book: OpeningBook {
                name: "2moves_v1.pgn".to_string(),
                sha256: hex::encode(Sha256::digest(BOOK)),
                source: "http://books.example/2moves_v1.pgn".to_string(),
            },
            dev: engine("101", "0123456789abcdef"),
            base: engine("102", "fedcba9876543210"),
        },
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    config: WorkerConfig,
    runner: PathBuf,
}

impl Fixture {
    fn new(runner_body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2moves_v1.pgn"), BOOK).unwrap();

        let config = WorkerConfig {
            engines_dir: dir.path().join("Engines"),
            scratch_dir: dir.path().join("tmp"),
            error_timeout_secs: 0,
            ..WorkerConfig::default()
        };

        let runner = dir.path().join("cutechess");
        let args = dir.path().join("args.txt");
        fs::write(
            &runner,
            format!("#!/bin/sh\necho \"$@\" > '{}'\n{}\n", args.display(), runner_body),
        )
        .unwrap();
        fs::set_permissions(&runner, fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, config, runner }
    }

    fn run(&self, coordinator: &FakeCoordinator, broken: &[&str]) -> Result<WorkloadOutcome, WorkloadError> {
        let provisioner = Provisioner::new(self.config.clone(), Box::new(TreeFetcher), Box::new(TouchBuilder));
        let validator = BenchValidator::new(
            FixedBench {
                broken: broken.iter().map(|s| s.to_string()).collect(),
            },
            2,
        );
        let pipeline = WorkloadPipeline {
            config: &self.config,
            coordinator,
            provisioner: &provisioner,
            validator: &validator,
            downloader: &NoDownloads,
            workdir: self.dir.path(),
            runner: &self.runner,
            threads: 2,
        };
        pipeline.process(&workload())
    }

    fn runner_args(&self) -> String {
        fs::read_to_string(self.dir.path().join("args.txt")).unwrap()
    }
}

fn score_line(w: u32, l: u32, d: u32) -> String {
    let n = w + l + d;
    format!("echo 'Score of Ethereal-01234567 vs Ethereal-fedcba98: {w} - {l} - {d}  [0.500] {n}'")
}

#[test]
fn test_workload_reports_scaled_session_results() {
    let body = [
        score_line(1, 0, 0),
        score_line(1, 1, 0),
        score_line(2, 1, 0),
        score_line(2, 1, 1),
        score_line(3, 1, 1),
        "echo 'Finished game 6 (Ethereal-fedcba98 vs Ethereal-01234567): 1-0 {Black disconnects}'".to_string(),
        score_line(3, 2, 1),
    ]
    .join("\n");
    let fixture = Fixture::new(&body);
    let coordinator = FakeCoordinator::default();

    let outcome = fixture.run(&coordinator, &[]).unwrap();

    match outcome {
        WorkloadOutcome::Completed(tally) => assert_eq!(tally.sent(), Score::new(3, 2, 1)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(*coordinator.nps.borrow(), vec![("3".to_string(), 500_000.0)]);

    let args = fixture.runner_args();
    assert!(args.contains("tc=40/120.0+1.0"), "{args}");
    assert!(args.contains("-concurrency 2"), "{args}");
    assert!(args.contains("-games 250"), "{args}");
    assert!(args.contains("name=Ethereal-01234567"), "{args}");

    let reports = coordinator.reports.borrow();
    assert_eq!(reports.len(), 2);
    assert_eq!(
        (reports[0].0.as_str(), reports[0].1.as_str(), reports[0].2.as_str()),
        ("3", "41", "17")
    );
    assert_eq!(
        reports[0].3,
        ResultDelta {
            wins: 3,
            losses: 1,
            draws: 1,
            crashes: 0,
            timelosses: 0
        }
    );
    assert_eq!(
        reports[1].3,
        ResultDelta {
            wins: 0,
            losses: 1,
            draws: 0,
            crashes: 1,
            timelosses: 0
        }
    );

    assert!(fixture.dir.path().join("Engines/0123456789abcdef").is_file());
    assert!(fixture.dir.path().join("Engines/fedcba9876543210").is_file());
}

#[test]
fn test_wrong_bench_is_reported_and_skips_the_match() {
    let fixture = Fixture::new(&score_line(1, 0, 0));
    let coordinator = FakeCoordinator::default();

    let err = fixture.run(&coordinator, &["fedcba9876543210"]).unwrap_err();

    assert!(matches!(
        err,
        WorkloadError::Consensus(ConsensusError::Mismatch { actual, .. }) if actual == BENCH + 1
    ));
    assert_eq!(
        *coordinator.wrong_benches.borrow(),
        vec![("17".to_string(), "102".to_string())]
    );
    assert!(coordinator.nps.borrow().is_empty());
    assert!(coordinator.reports.borrow().is_empty());
    assert!(!fixture.dir.path().join("args.txt").exists());
}

#[test]
fn test_stop_ends_the_workload() {
    let body = format!(
        "{}\nsleep 30",
        (1..=5).map(|w| score_line(w, 0, 0)).collect::<Vec<_>>().join("\n")
    );
    let fixture = Fixture::new(&body);
    let coordinator = FakeCoordinator::default();
    coordinator.replies.borrow_mut().push_back(ReportStatus::Stop);

    let outcome = fixture.run(&coordinator, &[]).unwrap();

    assert!(matches!(outcome, WorkloadOutcome::Aborted(_)));
    assert_eq!(coordinator.reports.borrow().len(), 1);
}

#[test]
fn test_tampered_book_skips_the_workload() {
    let fixture = Fixture::new(&score_line(1, 0, 0));
    fs::write(fixture.dir.path().join("2moves_v1.pgn"), b"tampered").unwrap();
    let coordinator = FakeCoordinator::default();

    let err = fixture.run(&coordinator, &[]).unwrap_err();

    assert!(matches!(err, WorkloadError::Book(_)));
    assert!(!fixture.dir.path().join("Engines").exists());
}
