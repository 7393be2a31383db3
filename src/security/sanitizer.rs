//! Command sanitization.
//!
//! Splits a multi-step command into operations and checks every path-like
//! argument against the sandbox root. The first violation rejects the whole
//! command; no partial result is ever returned.

use std::path::Path;

use thiserror::Error;

use super::sandbox::{is_sandboxed, SandboxError};
use super::tokenizer::{tokenize, Operation, SyntaxError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("path '{path}' in operation {index} is outside the allowed directory")]
    OutsideSandbox { path: String, index: usize },

    #[error("path '{path}' in operation {index} cannot be resolved: {source}")]
    Unresolvable {
        path: String,
        index: usize,
        #[source]
        source: SandboxError,
    },

    #[error("operation {index} uses unsupported shell syntax: {source}")]
    UnsupportedSyntax {
        index: usize,
        #[source]
        source: SyntaxError,
    },
}

impl ValidationError {
    /// The offending path, when the failure was about a path.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::OutsideSandbox { path, .. } | Self::Unresolvable { path, .. } => Some(path),
            Self::UnsupportedSyntax { .. } => None,
        }
    }

    pub fn operation_index(&self) -> usize {
        match self {
            Self::OutsideSandbox { index, .. }
            | Self::Unresolvable { index, .. }
            | Self::UnsupportedSyntax { index, .. } => *index,
        }
    }
}

/// Decides which argument tokens are checked against the sandbox.
pub trait PathPolicy {
    fn is_path_like(&self, token: &str) -> bool;
}

/// Not a flag, and contains `/` or `\`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeparatorHeuristic;

impl PathPolicy for SeparatorHeuristic {
    fn is_path_like(&self, token: &str) -> bool {
        !token.starts_with('-') && (token.contains('/') || token.contains('\\'))
    }
}

/// Treats every non-flag argument as a path.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryOperandPolicy;

impl PathPolicy for EveryOperandPolicy {
    fn is_path_like(&self, token: &str) -> bool {
        !token.starts_with('-')
    }
}

/// The sole gate between a proposed command and execution.
#[derive(Debug, Clone, Default)]
pub struct CommandSanitizer<P = SeparatorHeuristic> {
    policy: P,
}

impl CommandSanitizer<SeparatorHeuristic> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: PathPolicy> CommandSanitizer<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// Tokenize and validate, returning the parsed operations.
    pub fn parse(&self, command: &str, cwd: &Path) -> Result<Vec<Operation>, ValidationError> {
        let operations = tokenize(command).map_err(|e| {
            tracing::warn!("Rejected command with unsupported syntax: {}", e.error);
            ValidationError::UnsupportedSyntax {
                index: e.index,
                source: e.error,
            }
        })?;

        for (index, op) in operations.iter().enumerate() {
            for arg in op.arguments.iter().filter(|a| self.policy.is_path_like(a)) {
                match is_sandboxed(arg, cwd) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!("Operation {} escapes sandbox via '{}'", index, arg);
                        return Err(ValidationError::OutsideSandbox {
                            path: arg.clone(),
                            index,
                        });
                    }
                    Err(source) => {
                        return Err(ValidationError::Unresolvable {
                            path: arg.clone(),
                            index,
                            source,
                        });
                    }
                }
            }
        }

        Ok(operations)
    }

    /// Validate `command` and return its trimmed operations in order.
    pub fn sanitize(&self, command: &str, cwd: &Path) -> Result<Vec<String>, ValidationError> {
        Ok(self
            .parse(command, cwd)?
            .into_iter()
            .map(|op| op.source)
            .collect())
    }
}

/// Sanitize with the default separator heuristic.
pub fn sanitize(command: &str, cwd: impl AsRef<Path>) -> Result<Vec<String>, ValidationError> {
    CommandSanitizer::new().sanitize(command, cwd.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_valid_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let ops = sanitize("cat notes.txt && ls -la", dir.path()).unwrap();
        assert_eq!(ops, vec!["cat notes.txt", "ls -la"]);
    }

    #[test]
    fn test_sanitize_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = sanitize("cat notes.txt && rm ../../etc/passwd", dir.path()).unwrap_err();
        assert_eq!(err.path(), Some("../../etc/passwd"));
        assert_eq!(err.operation_index(), 1);
        assert!(err.to_string().contains("../../etc/passwd"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = "mkdir out && cp src/a.txt out/  && ls out";
        let first = sanitize(cmd, dir.path()).unwrap();
        let second = sanitize(cmd, dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["mkdir out", "cp src/a.txt out/", "ls out"]);
    }

    #[test]
    fn test_flags_and_bare_words_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        // Flag-prefixed tokens are never examined.
        assert!(sanitize("ls --color=/etc", dir.path()).is_ok());
        // No separator means not path-like under the default heuristic.
        assert!(sanitize("cat ..", dir.path()).is_ok());
    }

    #[test]
    fn test_absolute_path_outside() {
        let dir = tempfile::tempdir().unwrap();
        let err = sanitize("cat /etc/hosts", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::OutsideSandbox { index: 0, .. }));
    }

    #[test]
    fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sanitize("", dir.path()).unwrap().is_empty());
        assert!(sanitize(" && ", dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_syntax_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = sanitize("ls && cat a | grep b", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedSyntax { index: 1, .. }));
        assert_eq!(err.path(), None);
    }

    #[test]
    fn test_stricter_policy() {
        let dir = tempfile::tempdir().unwrap();
        let strict = CommandSanitizer::with_policy(EveryOperandPolicy);
        assert!(strict.sanitize("cat ..", dir.path()).is_err());
        assert!(strict.sanitize("cat notes.txt", dir.path()).is_ok());
    }

    #[test]
    fn test_quoted_path_is_checked_unquoted() {
        let dir = tempfile::tempdir().unwrap();
        let err = sanitize("cat '../../etc/passwd'", dir.path()).unwrap_err();
        assert_eq!(err.path(), Some("../../etc/passwd"));
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_into_symlink_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = sanitize("cat lin?/secret", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedSyntax { index: 0, .. }));
        assert!(sanitize("ls && rm *.txt", dir.path()).is_err());
        assert!(sanitize("cat 'lin?/secret'", dir.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_behind_missing_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = sanitize("mkdir -p a/../link/evil", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::OutsideSandbox { index: 0, .. }));
        assert_eq!(err.path(), Some("a/../link/evil"));
    }
}
