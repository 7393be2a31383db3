//! User interface module.
//!
//! The console front end: rendering reviews and outcomes, and collecting the
//! user's instructions and approvals.

pub mod console;

pub use console::ConsoleUi;
