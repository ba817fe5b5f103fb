//! Build toolchain invocation.

use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use crate::error::ProvisioningError;

/// What to build and where.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Directory holding the makefile
    pub dir: &'a Path,
    /// Name of the binary the build must produce
    pub exe_name: &'a str,
    /// Family-specific extra flags
    pub flags: &'a [String],
}

/// Produces `<exe_name>` (or `<exe_name>.exe`) inside the request's directory.
///
/// Success is judged by the artifact, not by the exit status: callers check
/// for the binary afterwards.
pub trait BuildEngine {
    fn build(&self, request: &BuildRequest<'_>) -> Result<(), ProvisioningError>;
}

/// Runs `make EXE=<name> <flags...>`.
#[derive(Debug, Clone)]
pub struct MakeBuilder {
    program: String,
}

impl MakeBuilder {
    pub fn new() -> Self {
        Self {
            program: "make".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MakeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildEngine for MakeBuilder {
    fn build(&self, request: &BuildRequest<'_>) -> Result<(), ProvisioningError> {
        info!(
            engine = request.exe_name,
            dir = %request.dir.display(),
            flags = ?request.flags,
            "building engine"
        );

        let status = Command::new(&self.program)
            .arg(format!("EXE={}", request.exe_name))
            .args(request.flags)
            .current_dir(request.dir)
            .status()
            .map_err(|source| ProvisioningError::Build {
                engine: request.exe_name.to_string(),
                dir: request.dir.to_path_buf(),
                source,
            })?;

        if !status.success() {
            warn!(engine = request.exe_name, %status, "build exited unsuccessfully");
        }
        Ok(())
    }
}
