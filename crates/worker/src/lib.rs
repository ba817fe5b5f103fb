//! Fleet worker
//!
//! Pulls workloads from the coordinator and runs them on this machine:
//! - [`machine`]: the coordinator-assigned machine id and OS name
//! - [`runner`]: installing the match runner binaries
//! - [`book`]: opening book download and hash check
//! - [`pipeline`]: one workload from engine setup to the last result upload

pub mod book;
pub mod error;
pub mod machine;
pub mod pipeline;
pub mod runner;

pub use error::*;
pub use pipeline::*;
