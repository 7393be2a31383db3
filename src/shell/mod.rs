//! Shell execution module.
//!
//! This module hands approved commands to the platform shell and captures
//! their output as a structured outcome.

mod runner;
pub use runner::{CommandRunner, ShellRunner};
