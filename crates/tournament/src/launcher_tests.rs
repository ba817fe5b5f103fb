use super::*;
use worker_core::{Assignment, OpeningBook, TestSpec};

fn engine(commit: &str, options: &str) -> EngineDescriptor {
    EngineDescriptor {
        id: "1".to_string(),
        name: "Ethereal".to_string(),
        commit: commit.to_string(),
        source: String::new(),
        expected_bench: 1,
        protocol: "uci".to_string(),
        options: options.to_string(),
    }
}

fn workload(book: &str, dev_options: &str, base_options: &str) -> Workload {
    Workload {
        machine: Assignment { id: "3".to_string() },
        result: Assignment { id: "8".to_string() },
        test: TestSpec {
            id: "5".to_string(),
            engine: "Ethereal".to_string(),
            baseline_nps: 1_000_000,
            time_control: "40/60+0.5".to_string(),
            book: OpeningBook {
                name: book.to_string(),
                sha256: String::new(),
                source: String::new(),
            },
            dev: engine("0123456789abcdef", dev_options),
            base: engine("fedcba9876543210", base_options),
        },
    }
}

#[test]
fn test_build_scales_time_control_and_concurrency() {
    let w = workload("2moves_v1.pgn", "Threads=1 Hash=8", "Threads=2 Hash=8");
    let params = SessionParameters::build(&w, 8, 400_000.0, 600_000.0, &WorkerConfig::default())
        .unwrap();

    assert_eq!(params.concurrency, 4);
    assert_eq!(params.games, 250);
    assert_eq!(params.variant, Variant::Standard);
    assert_eq!(params.engines[0].time_control, "40/120.0+1.0");
    assert_eq!(params.engines[1].time_control, "40/120.0+1.0");
    assert_eq!(params.engines[0].name, "Ethereal-01234567");
    assert_eq!(params.engines[1].name, "Ethereal-fedcba98");
    assert_eq!(params.engines[0].cmd, PathBuf::from("./Engines/0123456789abcdef"));
    assert_eq!(params.engines[1].options, vec!["Threads=2", "Hash=8"]);
    assert_eq!(params.openings.format, "pgn");
    assert_eq!(params.openings.plies, 16);
}

#[test]
fn test_frc_book_selects_variant() {
    let w = workload("3moves_FRC.pgn", "Threads=1", "Threads=1");
    let params =
        SessionParameters::build(&w, 1, 1e6, 1e6, &WorkerConfig::default()).unwrap();
    assert_eq!(params.variant, Variant::FischerRandom);
    assert_eq!(params.engines[0].time_control, "40/60.0+0.5");
}

#[test]
fn test_not_enough_threads() {
    let w = workload("2moves_v1.pgn", "Threads=8", "Threads=1");
    assert!(matches!(
        SessionParameters::build(&w, 4, 1e6, 1e6, &WorkerConfig::default()),
        Err(LaunchError::NoConcurrency { threads: 4, per_instance: 8 })
    ));
}

#[test]
fn test_zero_speed_is_rejected() {
    let w = workload("2moves_v1.pgn", "Threads=1", "Threads=1");
    assert!(matches!(
        SessionParameters::build(&w, 4, 0.0, 0.0, &WorkerConfig::default()),
        Err(LaunchError::TimeControl(_))
    ));
}

#[test]
fn test_to_args_layout() {
    let w = workload("8moves_v3.pgn", "Threads=1 Hash=8", "Threads=1 Hash=8");
    let mut params =
        SessionParameters::build(&w, 2, 1e6, 1e6, &WorkerConfig::default()).unwrap();
    params.seed = 42;

    let args = params.to_args();
    let expected_head = [
        "-repeat", "-recover", "-srand", "42", "-resign", "movecount=3", "score=400", "-draw",
        "movenumber=40", "movecount=8", "score=10", "-wait", "10", "-variant", "standard",
        "-concurrency", "2", "-games", "250", "-engine", "cmd=./Engines/0123456789abcdef",
        "proto=uci", "tc=40/60.0+0.5", "option.Threads=1", "option.Hash=8",
        "name=Ethereal-01234567", "-engine",
    ];
    assert_eq!(&args[..expected_head.len()], expected_head);

    let tail = &args[args.len() - 5..];
    assert_eq!(
        tail,
        ["-openings", "file=8moves_v3.pgn", "format=pgn", "order=random", "plies=16"]
    );
}
