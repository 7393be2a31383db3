//! Security module for command analysis and safety checks.
//!
//! This module classifies proposed commands for danger, confines their path
//! arguments to a sandbox root, and turns destructive removal into a
//! reversible move into the trash.

mod analyzer;
mod sandbox;
mod sanitizer;
mod tokenizer;
mod trash;

pub use analyzer::{classify, DangerClassifier, RiskPattern, DANGEROUS_COMMAND, RISK_PATTERNS};
pub use sandbox::{is_sandboxed, resolve, SandboxError};
pub use sanitizer::{
    sanitize, CommandSanitizer, EveryOperandPolicy, PathPolicy, SeparatorHeuristic,
    ValidationError,
};
pub use tokenizer::{tokenize, LocatedSyntaxError, Operation, SyntaxError};
pub use trash::{removal_target, ExecutionDecision, RemovalTarget, TrashInterceptor, REMOVAL_VERB};
