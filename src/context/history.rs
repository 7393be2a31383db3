//! Interaction history used as translator context.
//!
//! Holds `User: ...` / `Assistant: ...` lines for the current session. It is
//! append-only while the session runs; only the most recent lines are handed
//! to the translator.

/// Maximum number of lines kept in memory.
const MAX_HISTORY_SIZE: usize = 1000;

#[derive(Clone, Debug, Default)]
pub struct History {
    lines: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one translated instruction and the command it produced.
    /// Skips turns with an empty instruction or command.
    pub fn push_turn(&mut self, instruction: &str, command: &str) {
        let instruction = instruction.trim();
        let command = command.trim();
        if instruction.is_empty() || command.is_empty() {
            return;
        }

        self.lines.push(format!("User: {}", instruction));
        self.lines.push(format!("Assistant: {}", command));

        if self.lines.len() > MAX_HISTORY_SIZE {
            let excess = self.lines.len() - MAX_HISTORY_SIZE;
            self.lines.drain(..excess);
        }
    }

    /// Get the most recent n lines.
    pub fn recent(&self, n: usize) -> &[String] {
        let start = self.lines.len().saturating_sub(n);
        &self.lines[start..]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
