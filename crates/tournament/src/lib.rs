//! Match sessions for the fleet worker
//!
//! This crate provides infrastructure for:
//! - Building the match runner's session parameters from a workload
//! - Launching the runner and owning its process tree
//! - Turning the runner's output into events
//! - Reporting result deltas to the coordinator while the match runs
//!
//! # Usage
//!
//! ```ignore
//! let params = SessionParameters::build(&workload, threads, dev_nps, base_nps, &config)?;
//! let mut process = params.launch(&runner)?;
//! let outcome = drain_session(&mut process, &mut sink, &ReporterConfig::from_worker(&config))?;
//! ```

mod events;
mod launcher;
mod process;
mod reporter;

pub use events::*;
pub use launcher::*;
pub use process::*;
pub use reporter::*;
