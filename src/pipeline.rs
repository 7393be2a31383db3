//! The command safety pipeline.
//!
//! One user turn moves through
//! `Proposed -> Classified -> Sanitized -> {Rejected | PendingApproval}
//! -> {Approved -> (TrashIntercepted | Executed) | Declined} -> Recorded`.
//!
//! Approval is the only suspension point. Every terminal state appends exactly
//! one [`AuditRecord`]; a failure to append is reported in the [`TurnReport`]
//! and never undoes what already ran.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::ai::{CommandProposal, Translation};
use crate::audit::{current_actor, AuditRecord, AuditTrail, ExecutionOutcome, PersistenceError};
use crate::security::{
    removal_target, CommandSanitizer, DangerClassifier, ExecutionDecision, PathPolicy,
    RemovalTarget, SeparatorHeuristic, TrashInterceptor, ValidationError, DANGEROUS_COMMAND,
    RISK_PATTERNS,
};
use crate::shell::CommandRunner;

/// Proposals below this confidence are flagged on review.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

const OPERATION_JOINER: &str = " && ";

/// Why a proposal was rejected before approval.
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    #[error("the proposal contains no command")]
    Empty,

    #[error("{0}")]
    Removal(String),
}

/// Result of classifying and sanitizing a proposal.
#[derive(Debug)]
pub enum SafetyVerdict {
    Accepted {
        is_dangerous: bool,
        flags: BTreeSet<String>,
        sanitized_operations: Vec<String>,
    },
    Rejected {
        flags: BTreeSet<String>,
        reason: RejectReason,
    },
}

impl SafetyVerdict {
    pub fn flags(&self) -> &BTreeSet<String> {
        match self {
            Self::Accepted { flags, .. } | Self::Rejected { flags, .. } => flags,
        }
    }
}

/// What the approver sees while the pipeline waits.
#[derive(Debug)]
pub struct PendingReview<'a> {
    pub instruction: &'a str,
    /// Sanitized operations joined with ` && `.
    pub command: &'a str,
    pub proposal: &'a CommandProposal,
    pub flags: &'a BTreeSet<String>,
    pub low_confidence: bool,
}

impl PendingReview<'_> {
    pub fn is_dangerous(&self) -> bool {
        self.flags.contains(DANGEROUS_COMMAND)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

/// External decision for a pending command.
pub trait Approver {
    fn decide(&mut self, review: &PendingReview<'_>) -> Decision;
}

/// Terminal state of one turn.
#[derive(Debug)]
pub enum TurnOutcome {
    Ambiguous,
    Rejected(RejectReason),
    Declined,
    Executed(ExecutionOutcome),
    TrashIntercepted(ExecutionDecision),
}

#[derive(Debug)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// The record that was (or failed to be) appended for this turn.
    pub record: AuditRecord,
    pub audit_error: Option<PersistenceError>,
}

/// Composes classification, sanitization, approval, soft-delete and auditing
/// around a translated proposal.
#[derive(Debug)]
pub struct SafetyPipeline<R, P = SeparatorHeuristic> {
    classifier: DangerClassifier,
    sanitizer: CommandSanitizer<P>,
    trash: TrashInterceptor,
    audit: AuditTrail,
    runner: R,
    actor: String,
    confidence_threshold: f32,
}

impl<R: CommandRunner> SafetyPipeline<R> {
    pub fn new(trash: TrashInterceptor, audit: AuditTrail, runner: R) -> Self {
        Self {
            classifier: DangerClassifier::from_table(RISK_PATTERNS),
            sanitizer: CommandSanitizer::new(),
            trash,
            audit,
            runner,
            actor: current_actor(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl<R: CommandRunner, P: PathPolicy> SafetyPipeline<R, P> {
    /// Swap the path-likeness policy used by the sanitizer.
    pub fn with_path_policy<Q: PathPolicy>(self, policy: Q) -> SafetyPipeline<R, Q> {
        SafetyPipeline {
            classifier: self.classifier,
            sanitizer: CommandSanitizer::with_policy(policy),
            trash: self.trash,
            audit: self.audit,
            runner: self.runner,
            actor: self.actor,
            confidence_threshold: self.confidence_threshold,
        }
    }

    pub fn with_classifier(mut self, classifier: DangerClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Classify and sanitize a proposal against `cwd`. Never executes anything.
    pub fn review(&self, proposal: &CommandProposal, cwd: &Path) -> SafetyVerdict {
        let flags = self.classifier.classify(&proposal.raw_text);

        let operations = match self.sanitizer.sanitize(&proposal.raw_text, cwd) {
            Ok(ops) => ops,
            Err(e) => {
                return SafetyVerdict::Rejected {
                    flags,
                    reason: e.into(),
                };
            }
        };
        if operations.is_empty() {
            return SafetyVerdict::Rejected {
                flags,
                reason: RejectReason::Empty,
            };
        }
        // Removal is checked on the joined command so `rm` inside a chain is caught too.
        if let RemovalTarget::Invalid(reason) = removal_target(&operations.join(OPERATION_JOINER)) {
            return SafetyVerdict::Rejected {
                flags,
                reason: RejectReason::Removal(reason),
            };
        }

        SafetyVerdict::Accepted {
            is_dangerous: flags.contains(DANGEROUS_COMMAND),
            flags,
            sanitized_operations: operations,
        }
    }

    /// Run one turn to its terminal state and record it.
    pub async fn process<A: Approver>(
        &self,
        instruction: &str,
        translation: &Translation,
        cwd: &Path,
        approver: &mut A,
    ) -> TurnReport {
        let mut record = AuditRecord::for_proposal(&self.actor, instruction, translation.proposal());

        let outcome = match translation {
            Translation::Ambiguous(proposal) => {
                record.rejection = Some(format!("ambiguous instruction: {}", proposal.explanation));
                TurnOutcome::Ambiguous
            }
            Translation::Proposal(proposal) => {
                self.run_proposal(instruction, proposal, cwd, approver, &mut record)
                    .await
            }
        };

        // Exactly one append per turn, after anything that ran.
        let audit_error = self.audit.append(&record).err();
        if let Some(e) = &audit_error {
            tracing::error!("Audit record {} was not persisted: {}", record.id, e);
        }

        TurnReport {
            outcome,
            record,
            audit_error,
        }
    }

    async fn run_proposal<A: Approver>(
        &self,
        instruction: &str,
        proposal: &CommandProposal,
        cwd: &Path,
        approver: &mut A,
        record: &mut AuditRecord,
    ) -> TurnOutcome {
        let verdict = self.review(proposal, cwd);
        record.safety_flags = verdict.flags().clone();

        let operations = match verdict {
            SafetyVerdict::Rejected { reason, .. } => {
                tracing::warn!("Proposal '{}' rejected: {}", proposal.raw_text, reason);
                record.rejection = Some(reason.to_string());
                return TurnOutcome::Rejected(reason);
            }
            SafetyVerdict::Accepted {
                sanitized_operations,
                ..
            } => sanitized_operations,
        };

        // The record carries the sanitized command from here on, not the raw proposal.
        let command = operations.join(OPERATION_JOINER);
        record.chosen_command = command.clone();

        let review = PendingReview {
            instruction,
            command: &command,
            proposal,
            flags: &record.safety_flags,
            low_confidence: proposal.confidence < self.confidence_threshold,
        };
        if approver.decide(&review) == Decision::Decline {
            tracing::info!("Command '{}' declined", command);
            return TurnOutcome::Declined;
        }
        record.approved = true;

        // A removal never reaches the runner: it is either trashed or fails here.
        let decision = self.trash.intercept_in(&command, cwd);
        if let Some(outcome) = trash_outcome(&decision) {
            record.execution_outcome = Some(outcome);
            return TurnOutcome::TrashIntercepted(decision);
        }

        let outcome = self.runner.run(&command, &proposal.explanation, cwd).await;
        record.execution_outcome = Some(outcome.clone());
        TurnOutcome::Executed(outcome)
    }
}

/// The audit outcome of an intercepted removal, `None` for pass-through.
fn trash_outcome(decision: &ExecutionDecision) -> Option<ExecutionOutcome> {
    match decision {
        ExecutionDecision::PassThrough => None,
        ExecutionDecision::Trashed { file, destination } => {
            Some(ExecutionOutcome::trashed(file.clone(), destination.clone()))
        }
        ExecutionDecision::NotFound { file } => {
            Some(ExecutionOutcome::failed(format!("File not found: {}", file)))
        }
        ExecutionDecision::MoveFailed { file, error } => Some(ExecutionOutcome::failed(format!(
            "Failed to move '{}' to trash: {}",
            file, error
        ))),
        ExecutionDecision::InvalidCommand { reason } => Some(ExecutionOutcome::failed(reason.clone())),
    }
}
