use std::path::PathBuf;

use coordinator::CoordinatorError;
use provisioning::{ConsensusError, ProvisioningError};
use thiserror::Error;
use tournament::LaunchError;

/// The opening book could not be made available. Fatal to the current workload.
#[derive(Debug, Error)]
pub enum BookError {
    #[error(transparent)]
    Download(#[from] ProvisioningError),

    #[error("failed to unpack book archive {source_url}: {error}")]
    Zip {
        source_url: String,
        #[source]
        error: zip::result::ZipError,
    },

    #[error("book archive {source_url} does not contain {name}")]
    NotInArchive { source_url: String, name: String },

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("opening book {name} has sha256 {actual}, expected {expected}")]
    ShaMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

/// The match runner could not be installed.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Download(#[from] ProvisioningError),

    #[error("failed to install {path}: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can end a workload early.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error(transparent)]
    Book(#[from] BookError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("match session failed: {0}")]
    Session(#[source] std::io::Error),
}
