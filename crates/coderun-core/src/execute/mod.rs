//! Execution pipeline and bounded subprocess runner.
//!
//! # Module Structure
//!
//! - `command` - spawn one command with a timeout and output ceiling
//! - `pipeline` - the `Engine`: resolve, probe, compile, run, report, clean up

mod command;
mod pipeline;

pub use command::{CommandError, CommandOutput, Limits, run_bounded};
pub use pipeline::{Engine, Stage};
