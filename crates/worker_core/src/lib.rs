//! Core model for the fleet worker.
//!
//! This crate holds everything the workload pipeline shares but that does not
//! touch the network or spawn processes:
//! - the typed workload schema handed out by the coordinator
//! - worker configuration (timeouts, report cadence, build flags)
//! - time control parsing and speed scaling
//! - match tally and delta accounting

pub mod config;
pub mod error;
pub mod tally;
pub mod time_control;
pub mod workload;

pub use config::*;
pub use error::*;
pub use tally::*;
pub use time_control::*;
pub use workload::*;
