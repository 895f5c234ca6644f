//! Git operations for deploy targets.
//!
//! - [`CommandRunner`] executes git and lifecycle scripts with a timeout
//! - [`GitSync`] clones or resets the working copy and checks out tags

mod runner;
mod sync;

pub use runner::{CommandOutput, CommandRunner};
pub use sync::{GitSync, SyncReport};
