//! Session context handed to the translator.
//!
//! Collects the working directory, OS name and interaction history for one
//! translation request.

mod history;

use std::path::Path;

pub use history::History;

/// A snapshot of context information for one translation request.
#[derive(Clone, Debug)]
pub struct ContextSnapshot {
    pub cwd: String,
    pub os_name: String,
    pub recent_history: Vec<String>,
}

impl ContextSnapshot {
    /// Snapshot `cwd`, the running OS and the `history_limit` most recent
    /// history lines.
    pub fn new(cwd: &Path, history: &History, history_limit: usize) -> Self {
        Self {
            cwd: cwd.to_string_lossy().to_string(),
            os_name: std::env::consts::OS.to_string(),
            recent_history: history.recent(history_limit).to_vec(),
        }
    }
}
