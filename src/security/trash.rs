//! Soft-delete interception.
//!
//! An approved `rm` of a single file is rewritten into a move into the trash
//! directory. Every other command is handed back for normal execution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::tokenizer::tokenize;

/// Removal verb intercepted by [`TrashInterceptor`].
pub const REMOVAL_VERB: &str = "rm";

/// Upper bound on numeric suffixes tried when a trash name is taken.
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Outcome of intercepting an approved command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionDecision {
    /// The target was moved into the trash.
    Trashed { file: String, destination: PathBuf },
    /// The target does not exist; nothing was touched.
    NotFound { file: String },
    /// The move itself failed (permissions, cross-device, ...).
    MoveFailed { file: String, error: String },
    /// A removal that cannot be intercepted safely; nothing was executed.
    InvalidCommand { reason: String },
    /// Not a removal: run it through the execution collaborator as-is.
    PassThrough,
}

/// What a command asks to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalTarget {
    NotRemoval,
    Single(String),
    Invalid(String),
}

/// Classify a command with respect to soft-delete interception.
///
/// Only a standalone `rm` with exactly one non-flag operand is interceptable.
pub fn removal_target(command: &str) -> RemovalTarget {
    let operations = match tokenize(command) {
        Ok(ops) => ops,
        Err(e) => return RemovalTarget::Invalid(format!("cannot parse command: {}", e.error)),
    };

    let Some(position) = operations.iter().position(|op| op.verb == REMOVAL_VERB) else {
        return RemovalTarget::NotRemoval;
    };
    if operations.len() > 1 {
        return RemovalTarget::Invalid(format!(
            "'{}' must be proposed on its own, not as operation {} of {}",
            REMOVAL_VERB,
            position,
            operations.len()
        ));
    }

    let operands: Vec<&String> = operations[0]
        .arguments
        .iter()
        .filter(|a| !a.starts_with('-'))
        .collect();
    match operands.as_slice() {
        [] => RemovalTarget::Invalid("Invalid rm command, no file specified.".to_string()),
        [file] => RemovalTarget::Single((*file).clone()),
        _ => RemovalTarget::Invalid(format!(
            "Invalid rm command, {} files specified; remove one file at a time.",
            operands.len()
        )),
    }
}

/// Moves removal targets into a flat trash directory.
#[derive(Debug, Clone)]
pub struct TrashInterceptor {
    trash_root: PathBuf,
}

impl TrashInterceptor {
    /// Create the interceptor, creating the trash directory if needed.
    pub fn new(trash_root: impl Into<PathBuf>) -> io::Result<Self> {
        let trash_root = trash_root.into();
        fs::create_dir_all(&trash_root)?;
        Ok(Self { trash_root })
    }

    /// `~/.trash`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trash")
    }

    pub fn trash_root(&self) -> &Path {
        &self.trash_root
    }

    /// Intercept relative to the process's current directory.
    pub fn intercept(&self, command: &str) -> ExecutionDecision {
        match std::env::current_dir() {
            Ok(cwd) => self.intercept_in(command, &cwd),
            Err(e) => ExecutionDecision::InvalidCommand {
                reason: format!("cannot determine the current directory: {}", e),
            },
        }
    }

    /// Intercept with relative targets resolved against `base`.
    pub fn intercept_in(&self, command: &str, base: &Path) -> ExecutionDecision {
        let file = match removal_target(command) {
            RemovalTarget::NotRemoval => return ExecutionDecision::PassThrough,
            RemovalTarget::Invalid(reason) => return ExecutionDecision::InvalidCommand { reason },
            RemovalTarget::Single(file) => file,
        };

        let source = base.join(&file);
        // symlink_metadata so a dangling symlink is still trashed, not reported missing
        if fs::symlink_metadata(&source).is_err() {
            return ExecutionDecision::NotFound { file };
        }

        let Some(name) = source.file_name() else {
            return ExecutionDecision::InvalidCommand {
                reason: format!("'{}' has no file name to trash", file),
            };
        };

        // The trash is flat: only the base name survives.
        let destination = match self.free_destination(Path::new(name)) {
            Some(d) => d,
            None => {
                return ExecutionDecision::MoveFailed {
                    file,
                    error: "no free name left in the trash directory".to_string(),
                };
            }
        };

        // rename never copies; a move across filesystems fails and is reported
        match fs::rename(&source, &destination) {
            Ok(()) => {
                tracing::info!("Moved '{}' to '{}'", source.display(), destination.display());
                ExecutionDecision::Trashed { file, destination }
            }
            Err(e) => {
                tracing::error!("Failed to move '{}' to trash: {}", source.display(), e);
                ExecutionDecision::MoveFailed {
                    file,
                    error: e.to_string(),
                }
            }
        }
    }

    /// First of `name`, `name.1`, `name.2`, ... not present in the trash.
    fn free_destination(&self, name: &Path) -> Option<PathBuf> {
        let plain = self.trash_root.join(name);
        if fs::symlink_metadata(&plain).is_err() {
            return Some(plain);
        }
        (1..=MAX_COLLISION_SUFFIX)
            .map(|n| {
                let mut candidate = name.as_os_str().to_os_string();
                candidate.push(format!(".{}", n));
                self.trash_root.join(candidate)
            })
            .find(|candidate| fs::symlink_metadata(candidate).is_err())
    }
}
