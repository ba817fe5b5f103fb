//! Match session parameters and runner launch.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use worker_core::{speed_factor, scale_time_control, EngineDescriptor, TimeControlError, WorkerConfig, Workload};

use crate::process::MatchProcess;

/// Board variant played by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Variant {
    Standard,
    FischerRandom,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::FischerRandom => "fischerandom",
        }
    }
}

/// How one engine is started by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInvocation {
    pub cmd: PathBuf,
    pub protocol: String,
    pub time_control: String,
    /// `Key=Value` pairs forwarded as `option.Key=Value`
    pub options: Vec<String>,
    pub name: String,
}

/// Opening selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Openings {
    pub file: String,
    pub format: String,
    pub order: String,
    pub plies: u32,
}

/// Everything the runner needs for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionParameters {
    pub seed: u32,
    pub resign: String,
    pub draw: String,
    pub wait_ms: u32,
    pub variant: Variant,
    pub concurrency: u32,
    pub games: u32,
    /// Dev first, base second
    pub engines: [EngineInvocation; 2],
    pub openings: Openings,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("engine {engine} has no usable Threads option in {options:?}")]
    MissingThreads { engine: String, options: String },

    #[error("{threads} worker threads cannot host engines needing {per_instance} threads each")]
    NoConcurrency { threads: u32, per_instance: u32 },

    #[error(transparent)]
    TimeControl(#[from] TimeControlError),

    #[error("failed to start match runner {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionParameters {
    /// Derive the session for `workload` on a machine with `threads` threads
    /// whose engines measured `dev_nps` and `base_nps`.
    pub fn build(
        workload: &Workload,
        threads: u32,
        dev_nps: f64,
        base_nps: f64,
        config: &WorkerConfig,
    ) -> Result<Self, LaunchError> {
        let test = &workload.test;
        let dev_threads = instance_threads(&test.dev)?;
        let base_threads = instance_threads(&test.base)?;

        let per_instance = dev_threads.max(base_threads);
        let concurrency = threads / per_instance;
        if concurrency == 0 {
            return Err(LaunchError::NoConcurrency {
                threads,
                per_instance,
            });
        }

        let measured = (dev_nps + base_nps) / 2.0;
        let factor = speed_factor(test.baseline_nps as f64, measured)?;
        let time_control = scale_time_control(&test.time_control, factor)?;
        info!(
            nominal = %test.time_control,
            scaled = %time_control,
            factor,
            "scaled time control"
        );

        let variant = if test.book.is_fischer_random() {
            Variant::FischerRandom
        } else {
            Variant::Standard
        };

        let invocation = |engine: &EngineDescriptor| EngineInvocation {
            cmd: engine_command(&config.engines_dir, &engine.commit),
            protocol: engine.protocol.clone(),
            time_control: time_control.clone(),
            options: engine.options().map(str::to_string).collect(),
            name: format!("{}-{}", test.engine, engine.short_commit()),
        };

        Ok(Self {
            seed: rand::random(),
            resign: config.session.resign.clone(),
            draw: config.session.draw.clone(),
            wait_ms: config.session.wait_ms,
            variant,
            concurrency,
            games: config.games_per_task,
            engines: [invocation(&test.dev), invocation(&test.base)],
            openings: Openings {
                file: test.book.name.clone(),
                format: test.book.format().to_string(),
                order: "random".to_string(),
                plies: config.session.book_plies,
            },
        })
    }

    /// Render the runner's command line (without the program itself).
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-repeat".into(),
            "-recover".into(),
            "-srand".into(),
            self.seed.to_string(),
            "-resign".into(),
        ];
        args.extend(self.resign.split_whitespace().map(str::to_string));
        args.push("-draw".into());
        args.extend(self.draw.split_whitespace().map(str::to_string));
        args.extend([
            "-wait".to_string(),
            self.wait_ms.to_string(),
            "-variant".to_string(),
            self.variant.as_str().to_string(),
            "-concurrency".to_string(),
            self.concurrency.to_string(),
            "-games".to_string(),
            self.games.to_string(),
        ]);

        for engine in &self.engines {
            args.push("-engine".into());
            args.push(format!("cmd={}", engine.cmd.display()));
            args.push(format!("proto={}", engine.protocol));
            args.push(format!("tc={}", engine.time_control));
            args.extend(engine.options.iter().map(|o| format!("option.{}", o)));
            args.push(format!("name={}", engine.name));
        }

        args.extend([
            "-openings".to_string(),
            format!("file={}", self.openings.file),
            format!("format={}", self.openings.format),
            format!("order={}", self.openings.order),
            format!("plies={}", self.openings.plies),
        ]);
        args
    }

    /// Start `runner` with these parameters, stdout piped for parsing.
    pub fn launch(&self, runner: &Path) -> Result<MatchProcess, LaunchError> {
        if let Ok(json) = serde_json::to_string(self) {
            debug!(session = %json, "session parameters");
        }
        info!(
            runner = %runner.display(),
            concurrency = self.concurrency,
            games = self.games,
            variant = self.variant.as_str(),
            "starting match session"
        );

        let mut command = Command::new(runner);
        command
            .args(self.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped());

        MatchProcess::spawn(command).map_err(|source| LaunchError::Spawn {
            program: runner.to_path_buf(),
            source,
        })
    }
}

fn instance_threads(engine: &EngineDescriptor) -> Result<u32, LaunchError> {
    engine.threads().ok_or_else(|| LaunchError::MissingThreads {
        engine: engine.name.clone(),
        options: engine.options.clone(),
    })
}

/// Relative cache paths are made explicit so the runner does not search `PATH`.
fn engine_command(engines_dir: &Path, commit: &str) -> PathBuf {
    let path = engines_dir.join(commit);
    if path.is_relative() && !path.starts_with(".") {
        Path::new(".").join(path)
    } else {
        path
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod launcher_tests;
