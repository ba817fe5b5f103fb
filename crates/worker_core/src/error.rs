//! Error types shared across the worker crates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating [`crate::WorkerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A nominal time control that cannot be scaled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeControlError {
    #[error("unsupported time control {0:?}")]
    Malformed(String),

    #[error("invalid speed factor {factor} (baseline {baseline_nps} nps, measured {measured_nps} nps)")]
    InvalidSpeed {
        factor: f64,
        baseline_nps: f64,
        measured_nps: f64,
    },
}

/// A coordinator payload that does not match the workload schema.
#[derive(Debug, Error)]
pub enum ProtocolParseError {
    #[error("malformed workload payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid workload field `{field}`: {reason}")]
    Field { field: &'static str, reason: String },
}
