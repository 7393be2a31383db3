//! rusty-nlsh - natural-language shell commands behind a safety pipeline
//!
//! This library turns a translated command proposal into an approved or
//! rejected command, and keeps an audit trail of every decision:
//! - Danger classification against a fixed pattern table
//! - Path sandboxing of every path-like argument
//! - Fail-closed sanitization of multi-step commands
//! - Soft delete of removed files into a trash directory
//! - An append-only JSON Lines audit log
//!
//! # Example
//!
//! ```no_run
//! use rusty_nlsh::audit::AuditTrail;
//! use rusty_nlsh::pipeline::SafetyPipeline;
//! use rusty_nlsh::security::TrashInterceptor;
//! use rusty_nlsh::shell::ShellRunner;
//!
//! # fn main() -> anyhow::Result<()> {
//! let trash = TrashInterceptor::new(TrashInterceptor::default_root())?;
//! let audit = AuditTrail::open("audit_log.jsonl")?;
//! let pipeline = SafetyPipeline::new(trash, audit, ShellRunner);
//!
//! // review() classifies and sanitizes without executing anything;
//! // process() additionally asks an Approver and records the outcome.
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod app;
pub mod audit;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod security;
pub mod shell;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use ai::{CommandProposal, Translation, TranslatorBackend};
pub use app::{App, AppContext};
pub use audit::{AuditRecord, AuditTrail, ExecutionOutcome};
pub use pipeline::{Approver, Decision, SafetyPipeline, SafetyVerdict, TurnOutcome, TurnReport};
pub use security::{classify, is_sandboxed, sanitize, TrashInterceptor, ValidationError};
