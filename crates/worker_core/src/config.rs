//! Worker configuration.
//!
//! Every component receives the pieces of [`WorkerConfig`] it needs at
//! construction time. Defaults match the fleet's standard settings; an
//! optional TOML file can override any field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Timeout for every coordinator request
    pub http_timeout_secs: u64,
    /// Back-off when the coordinator has no work
    pub workload_timeout_secs: u64,
    /// Back-off after an uncaught workload failure
    pub error_timeout_secs: u64,
    /// Upper bound for a single `bench` lane
    pub bench_timeout_secs: u64,
    /// Games played per workload
    pub games_per_task: u32,
    /// Games between result uploads
    pub report_rate: u32,
    /// Attempts made to flush pending results once the match stream closes
    pub final_report_attempts: u32,
    /// Cache directory for built engines, keyed by commit hash
    pub engines_dir: PathBuf,
    /// Parent directory for per-build scratch areas
    pub scratch_dir: PathBuf,
    /// Directory inside an extracted source archive where the build runs
    pub build_subdir: PathBuf,
    /// Match session policy
    pub session: SessionPolicy,
    /// Extra build flags keyed by uppercase engine family name
    pub build_flags: BTreeMap<String, Vec<String>>,
}

/// Fixed adjudication and opening policy handed to the match runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Resign adjudication, e.g. `movecount=3 score=400`
    pub resign: String,
    /// Draw adjudication, e.g. `movenumber=40 movecount=8 score=10`
    pub draw: String,
    /// Delay between games in milliseconds
    pub wait_ms: u32,
    /// Opening depth taken from the book
    pub book_plies: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            resign: "movecount=3 score=400".to_string(),
            draw: "movenumber=40 movecount=8 score=10".to_string(),
            wait_ms: 10,
            book_plies: 16,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let build_flags = ["ETHEREAL", "LASER", "WEISS", "DEMOLITO"]
            .into_iter()
            .map(|family| (family.to_string(), Vec::new()))
            .collect();

        Self {
            http_timeout_secs: 30,
            workload_timeout_secs: 60,
            error_timeout_secs: 60,
            bench_timeout_secs: 120,
            games_per_task: 250,
            report_rate: 5,
            final_report_attempts: 3,
            engines_dir: PathBuf::from("Engines"),
            scratch_dir: PathBuf::from("tmp"),
            build_subdir: PathBuf::from("src"),
            session: SessionPolicy::default(),
            build_flags,
        }
    }
}

impl WorkerConfig {
    /// Load a configuration file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the reporting loop or the session meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_rate == 0 {
            return Err(ConfigError::Invalid("report_rate must be at least 1".to_string()));
        }
        if self.games_per_task == 0 {
            return Err(ConfigError::Invalid("games_per_task must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build flags for an engine family. Lookup is case-insensitive.
    pub fn build_flags_for(&self, family: &str) -> &[String] {
        self.build_flags
            .get(&family.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn workload_timeout(&self) -> Duration {
        Duration::from_secs(self.workload_timeout_secs)
    }

    pub fn error_timeout(&self) -> Duration {
        Duration::from_secs(self.error_timeout_secs)
    }

    pub fn bench_timeout(&self) -> Duration {
        Duration::from_secs(self.bench_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
