//! Machine identity.
//!
//! The coordinator assigns an id the first time a machine asks for work. It
//! is kept in `machine.txt` so later runs report as the same machine; until
//! then the worker sends the literal `None`.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

pub const MACHINE_FILE: &str = "machine.txt";

/// Id sent before the coordinator has registered this machine.
pub const UNREGISTERED: &str = "None";

/// The stored id, or `None` for an unregistered machine.
pub fn read_machine_id(dir: &Path) -> String {
    let path = dir.join(MACHINE_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => match text.lines().next().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => UNREGISTERED.to_string(),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("machine is unregistered");
            UNREGISTERED.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read machine id");
            UNREGISTERED.to_string()
        }
    }
}

pub fn write_machine_id(dir: &Path, id: &str) -> io::Result<()> {
    fs::write(dir.join(MACHINE_FILE), id)
}

/// `<system> <release>`, e.g. `Linux 6.8.0-45-generic`.
#[cfg(unix)]
pub fn os_name() -> String {
    match nix::sys::utsname::uname() {
        Ok(uts) => format!(
            "{} {}",
            uts.sysname().to_string_lossy(),
            uts.release().to_string_lossy()
        ),
        Err(_) => std::env::consts::OS.to_string(),
    }
}

#[cfg(not(unix))]
pub fn os_name() -> String {
    "Windows".to_string()
}
