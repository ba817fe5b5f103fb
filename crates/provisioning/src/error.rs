use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a local engine binary. Fatal to the current workload.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} answered with HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("failed to extract {url}: {source}")]
    Extract {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run build for {engine} in {dir}: {source}")]
    Build {
        engine: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build of {engine} ({commit}) produced no binary; looked for {searched:?}")]
    MissingArtifact {
        engine: String,
        commit: String,
        searched: Vec<PathBuf>,
    },

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisioningError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}

/// An engine whose benchmark cannot be trusted. Fatal to the current workload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("bench lanes for {engine} ({commit}) disagree: {benches:?}")]
    Disagreement {
        engine: String,
        commit: String,
        benches: Vec<u64>,
    },

    #[error("every bench lane for {engine} ({commit}) failed to produce a result ({lanes} lanes)")]
    AllLanesFailed {
        engine: String,
        commit: String,
        lanes: usize,
    },

    #[error("invalid bench for {engine} ({commit}): got {actual}, expected {expected}")]
    Mismatch {
        engine: String,
        commit: String,
        expected: u64,
        actual: u64,
    },
}
