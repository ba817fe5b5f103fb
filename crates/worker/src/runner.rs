//! Match runner installation.
//!
//! The coordinator hosts prebuilt runner binaries; `getFiles` names the base
//! URL. Only files missing from the working directory are downloaded.

use std::fs;
use std::path::{Path, PathBuf};

use coordinator::{url_join, Coordinator};
use provisioning::Downloader;
use tracing::info;

use crate::error::RunnerError;

/// One file of the runner distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerFile {
    /// Name on the file server
    pub remote: &'static str,
    /// Name in the working directory
    pub local: &'static str,
    pub executable: bool,
}

#[cfg(windows)]
pub const RUNNER_FILES: &[RunnerFile] = &[
    RunnerFile {
        remote: "cutechess-windows.exe",
        local: "cutechess.exe",
        executable: true,
    },
    RunnerFile {
        remote: "cutechess-qt5core.dll",
        local: "Qt5Core.dll",
        executable: false,
    },
];

#[cfg(not(windows))]
pub const RUNNER_FILES: &[RunnerFile] = &[
    RunnerFile {
        remote: "cutechess-linux",
        local: "cutechess",
        executable: true,
    },
    RunnerFile {
        remote: "libcutechess.so.1",
        local: "libcutechess.so.1",
        executable: false,
    },
];

/// Install whatever part of the runner is missing from `dir` and return the
/// runner's path.
pub fn ensure_runner<C: Coordinator + ?Sized>(
    coordinator: &C,
    downloader: &dyn Downloader,
    dir: &Path,
) -> Result<PathBuf, RunnerError> {
    install_files(RUNNER_FILES, coordinator, downloader, dir)?;
    let exe = RUNNER_FILES
        .iter()
        .find(|f| f.executable)
        .map(|f| f.local)
        .unwrap_or("cutechess");
    Ok(dir.join(exe))
}

fn install_files<C: Coordinator + ?Sized>(
    files: &[RunnerFile],
    coordinator: &C,
    downloader: &dyn Downloader,
    dir: &Path,
) -> Result<(), RunnerError> {
    let missing: Vec<&RunnerFile> = files.iter().filter(|f| !dir.join(f.local).is_file()).collect();
    if missing.is_empty() {
        return Ok(());
    }

    let base = coordinator.runner_files_url()?;
    for file in missing {
        let url = url_join(&[base.as_str(), file.remote]);
        let url = url.trim_end_matches('/');
        let bytes = downloader.download(url)?;

        let path = dir.join(file.local);
        fs::write(&path, &bytes).map_err(|source| RunnerError::Install {
            path: path.clone(),
            source,
        })?;
        if file.executable {
            mark_executable(&path)?;
        }
        info!(path = %path.display(), "installed match runner file");
    }
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), RunnerError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|source| RunnerError::Install {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), RunnerError> {
    Ok(())
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod runner_tests;
