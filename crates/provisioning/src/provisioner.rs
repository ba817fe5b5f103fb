//! Engine binary cache.
//!
//! Binaries live in `<engines_dir>/<commit>`. The directory is append-only:
//! a present entry is trusted as-is, a missing one is fetched and built once.
//! Workers sharing the directory never lock it; the final move into place is a
//! rename, so readers only ever see complete binaries.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use worker_core::{EngineDescriptor, WorkerConfig};

use crate::build::{BuildEngine, BuildRequest};
use crate::error::ProvisioningError;
use crate::fetch::ArchiveFetcher;

/// A built engine in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBinary {
    pub commit: String,
    pub path: PathBuf,
}

pub struct Provisioner {
    config: WorkerConfig,
    fetcher: Box<dyn ArchiveFetcher>,
    builder: Box<dyn BuildEngine>,
}

impl Provisioner {
    pub fn new(
        config: WorkerConfig,
        fetcher: Box<dyn ArchiveFetcher>,
        builder: Box<dyn BuildEngine>,
    ) -> Self {
        Self {
            config,
            fetcher,
            builder,
        }
    }

    /// Where the binary for `commit` lives (whether or not it exists yet).
    pub fn cache_path(&self, commit: &str) -> PathBuf {
        self.config.engines_dir.join(commit)
    }

    /// Make sure `engine` is built and cached, returning its location.
    ///
    /// `family` selects extra build flags.
    pub fn ensure(
        &self,
        engine: &EngineDescriptor,
        family: &str,
    ) -> Result<LocalBinary, ProvisioningError> {
        let target = self.cache_path(&engine.commit);
        if target.is_file() {
            debug!(engine = %engine.name, commit = %engine.commit, "engine already cached");
            return Ok(LocalBinary {
                commit: engine.commit.clone(),
                path: target,
            });
        }

        info!(
            engine = %engine.name,
            commit = %engine.commit,
            source = %engine.source,
            "setting up engine"
        );

        fs::create_dir_all(&self.config.engines_dir)
            .map_err(ProvisioningError::io("create", &self.config.engines_dir))?;
        fs::create_dir_all(&self.config.scratch_dir)
            .map_err(ProvisioningError::io("create", &self.config.scratch_dir))?;

        // Removed on drop, whichever way this function returns.
        let scratch = tempfile::Builder::new()
            .prefix("build-")
            .tempdir_in(&self.config.scratch_dir)
            .map_err(ProvisioningError::io("create scratch in", &self.config.scratch_dir))?;

        self.fetcher.fetch(&engine.source, scratch.path())?;

        let build_dir = archive_root(scratch.path())?.join(&self.config.build_subdir);
        self.builder.build(&BuildRequest {
            dir: &build_dir,
            exe_name: &engine.name,
            flags: self.config.build_flags_for(family),
        })?;

        let candidates = [
            build_dir.join(format!("{}.exe", engine.name)),
            build_dir.join(&engine.name),
        ];
        let artifact = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| ProvisioningError::MissingArtifact {
                engine: engine.name.clone(),
                commit: engine.commit.clone(),
                searched: candidates.to_vec(),
            })?;

        install(artifact, &target)?;
        info!(engine = %engine.name, commit = %engine.commit, path = %target.display(), "engine cached");

        Ok(LocalBinary {
            commit: engine.commit.clone(),
            path: target,
        })
    }
}

/// The directory an archive unpacked into.
///
/// Source archives usually hold a single `<repo>-<ref>/` directory; anything
/// else is treated as already rooted at `dir`.
pub fn archive_root(dir: &Path) -> Result<PathBuf, ProvisioningError> {
    let entries = fs::read_dir(dir)
        .map_err(ProvisioningError::io("read", dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ProvisioningError::io("read", dir))?;

    match entries.as_slice() {
        [single] if single.path().is_dir() => Ok(single.path()),
        _ => Ok(dir.to_path_buf()),
    }
}

/// Move `artifact` to `target`, copying through a sibling temp file when the
/// two are on different filesystems.
fn install(artifact: &Path, target: &Path) -> Result<(), ProvisioningError> {
    if fs::rename(artifact, target).is_ok() {
        return Ok(());
    }

    let staging = target.with_file_name(format!(
        ".{}.partial-{}",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        std::process::id()
    ));
    fs::copy(artifact, &staging).map_err(ProvisioningError::io("copy to", &staging))?;
    fs::rename(&staging, target).map_err(ProvisioningError::io("rename into", target))
}

#[cfg(test)]
#[path = "provisioner_tests.rs"]
mod provisioner_tests;
