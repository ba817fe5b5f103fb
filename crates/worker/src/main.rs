//! Fleet worker CLI
//!
//! Registers with the coordinator, then pulls and completes workloads until
//! it is killed or the coordinator rejects its credentials.
//!
//! ```bash
//! worker -U alice -P secret -S http://coordinator.example -T 8
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use coordinator::{Coordinator, Credentials, HttpCoordinator, WorkloadReply, WorkloadRequest};
use provisioning::{BenchRunner, BenchValidator, HttpArchiveFetcher, MakeBuilder, ProcessBenchRunner, Provisioner};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use worker::machine::{os_name, read_machine_id, write_machine_id};
use worker::runner::ensure_runner;
use worker::{WorkloadOutcome, WorkloadPipeline};
use worker_core::WorkerConfig;

/// Engine-testing fleet worker.
#[derive(Parser, Debug)]
#[command(name = "worker", version, about = "Engine-testing fleet worker", long_about = None)]
struct Args {
    /// Coordinator username
    #[arg(short = 'U', long, env = "WORKER_USERNAME")]
    username: String,

    /// Coordinator password
    #[arg(short = 'P', long, env = "WORKER_PASSWORD", hide_env_values = true)]
    password: String,

    /// Coordinator address, e.g. http://coordinator.example
    #[arg(short = 'S', long)]
    server: String,

    /// Threads this machine dedicates to testing
    #[arg(short = 'T', long, value_parser = clap::value_parser!(u32).range(1..))]
    threads: u32,

    /// Optional TOML file overriding the default settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the engine cache, books and the match runner
    #[arg(long, default_value = ".")]
    workdir: PathBuf,
}

/// What one poll of the coordinator amounted to.
enum Poll {
    Idle,
    Worked,
    Rejected,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => WorkerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => WorkerConfig::default(),
    };

    std::env::set_current_dir(&args.workdir)
        .with_context(|| format!("entering {}", args.workdir.display()))?;
    let workdir = Path::new(".");

    let coordinator = HttpCoordinator::new(
        args.server.clone(),
        Credentials {
            username: args.username.clone(),
            password: args.password.clone(),
        },
        config.http_timeout(),
    )?;
    let downloader = HttpArchiveFetcher::new(config.http_timeout())?;

    let runner = ensure_runner(&coordinator, &downloader, workdir).context("installing the match runner")?;
    fs::create_dir_all(&config.engines_dir)
        .with_context(|| format!("creating {}", config.engines_dir.display()))?;

    let provisioner = Provisioner::new(
        config.clone(),
        Box::new(HttpArchiveFetcher::new(config.http_timeout())?),
        Box::new(MakeBuilder::new()),
    );
    let validator = BenchValidator::new(ProcessBenchRunner::new(config.bench_timeout()), args.threads as usize);

    let pipeline = WorkloadPipeline {
        config: &config,
        coordinator: &coordinator,
        provisioner: &provisioner,
        validator: &validator,
        downloader: &downloader,
        workdir,
        runner: &runner,
        threads: args.threads,
    };

    let mut request = WorkloadRequest {
        machine_id: read_machine_id(workdir),
        threads: args.threads,
        os_name: os_name(),
    };
    info!(
        server = %coordinator.server(),
        machine = %request.machine_id,
        threads = request.threads,
        os = %request.os_name,
        "worker started"
    );

    loop {
        match poll(&pipeline, &mut request) {
            Ok(Poll::Worked) => {}
            Ok(Poll::Idle) => {
                info!("coordinator has no work");
                thread::sleep(config.workload_timeout());
            }
            Ok(Poll::Rejected) => anyhow::bail!("coordinator rejected the login credentials"),
            Err(e) => {
                error!("{:#}", e);
                thread::sleep(config.error_timeout());
            }
        }
    }
}

fn poll<C, R>(pipeline: &WorkloadPipeline<'_, C, R>, request: &mut WorkloadRequest) -> Result<Poll>
where
    C: Coordinator + ?Sized,
    R: BenchRunner + Sync,
{
    let workload = match pipeline.coordinator.request_workload(request)? {
        WorkloadReply::NoWork => return Ok(Poll::Idle),
        WorkloadReply::BadCredentials => return Ok(Poll::Rejected),
        WorkloadReply::Assigned(workload) => workload,
    };

    if request.machine_id != workload.machine.id {
        request.machine_id = workload.machine.id.clone();
        if let Err(e) = write_machine_id(pipeline.workdir, &request.machine_id) {
            warn!(error = %e, "failed to store machine id");
        }
    }

    let outcome = pipeline
        .process(&workload)
        .with_context(|| format!("workload for test {}", workload.test.id))?;
    match outcome {
        WorkloadOutcome::Completed(tally) => info!(score = ?tally.cumulative(), "workload completed"),
        WorkloadOutcome::Aborted(tally) => info!(score = ?tally.cumulative(), "workload stopped by coordinator"),
    }
    Ok(Poll::Worked)
}
