//! Audit record types.
//!
//! Records are written as one JSON object per line. Every field has a default
//! so that older or newer lines with missing fields still deserialize.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::CommandProposal;

/// What happened when an approved command was carried out.
///
/// Serialized untagged so each variant keeps the flat shape of the log:
/// `{stdout, stderr, exit_status}`, `{action, file, destination}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionOutcome {
    Trashed {
        action: TrashAction,
        file: String,
        destination: PathBuf,
    },
    Completed {
        stdout: String,
        stderr: String,
        exit_status: Option<i32>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashAction {
    Trashed,
}

impl ExecutionOutcome {
    pub fn trashed(file: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self::Trashed {
            action: TrashAction::Trashed,
            file: file.into(),
            destination: destination.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            stderr: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// One immutable entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub input_text: String,
    pub chosen_command: String,
    pub explanation: String,
    pub confidence: f32,
    pub safety_flags: BTreeSet<String>,
    pub rule_fallback: bool,
    pub model_meta: BTreeMap<String, String>,
    pub approved: bool,
    pub execution_outcome: Option<ExecutionOutcome>,
    /// Why the proposal never reached approval, if it didn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl AuditRecord {
    /// Start a record for a decision about `proposal`.
    pub fn for_proposal(actor: &str, input_text: &str, proposal: &CommandProposal) -> Self {
        Self {
            id: new_record_id(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            input_text: input_text.to_string(),
            chosen_command: proposal.raw_text.clone(),
            explanation: proposal.explanation.clone(),
            confidence: proposal.confidence,
            safety_flags: BTreeSet::new(),
            rule_fallback: proposal.rule_fallback,
            model_meta: proposal.source_meta.clone(),
            approved: false,
            execution_outcome: None,
            rejection: None,
        }
    }
}

/// 122 random bits from a v4 UUID, rendered as simple hex.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Login name of the user running the process.
pub fn current_actor() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
