//! Coordinator protocol for the fleet worker.
//!
//! Every call is a form-encoded POST (or a plain GET for `getFiles`) answered
//! with a short text body. [`Coordinator`] is the seam the rest of the worker
//! talks to; [`HttpCoordinator`] is the real implementation.

mod client;
mod protocol;

pub use client::*;
pub use protocol::*;
