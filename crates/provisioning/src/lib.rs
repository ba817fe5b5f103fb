//! Engine provisioning for the fleet worker.
//!
//! - [`Provisioner`] turns an engine descriptor into a binary in the local
//!   cache, fetching and building it only when the commit is not cached yet.
//! - [`BenchValidator`] runs the binary's `bench` command on several lanes at
//!   once, checks that every lane agrees on the node count, and measures speed.

mod bench;
mod build;
mod error;
mod fetch;
mod provisioner;

pub use bench::*;
pub use build::*;
pub use error::*;
pub use fetch::*;
pub use provisioner::*;
