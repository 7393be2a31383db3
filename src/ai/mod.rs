//! AI module for translating natural language into command proposals.
//!
//! This module provides the translator collaborator: a model-backed client
//! talking to an OpenAI-compatible endpoint, a rule-based fallback, and the
//! prompt and reply parsing between them.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod rules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::ModelTranslator;
pub use rules::RuleTranslator;

/// Command text a translator returns for an ambiguous instruction.
pub const AMBIGUOUS_MARKER: &str = "AMBIGUOUS";

/// `source_meta` key naming the model that produced a proposal.
pub const META_MODEL: &str = "model";

/// A candidate command produced by a translator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandProposal {
    pub raw_text: String,
    pub explanation: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub source_meta: BTreeMap<String, String>,
    /// Produced by the rule-based fallback rather than the model.
    pub rule_fallback: bool,
}

/// A translator's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Proposal(CommandProposal),
    /// The instruction was too vague to translate. The proposal carries the
    /// explanation and metadata; its command is the ambiguity marker.
    Ambiguous(CommandProposal),
}

impl Translation {
    pub fn proposal(&self) -> &CommandProposal {
        match self {
            Self::Proposal(p) | Self::Ambiguous(p) => p,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("model request failed: {0}")]
    Request(#[from] async_openai::error::OpenAIError),

    #[error("model returned no content")]
    EmptyReply,

    #[error("model output is not valid JSON: {0}")]
    Unparseable(String),
}

/// Everything a translator gets to see for one instruction.
#[derive(Debug, Clone)]
pub struct TranslationRequest<'a> {
    pub instruction: &'a str,
    pub cwd: &'a str,
    pub os_name: &'a str,
    pub history: &'a [String],
}

/// Result of [`TranslatorBackend::translate`].
#[derive(Debug)]
pub struct TranslationAttempt {
    pub translation: Translation,
    /// Set when the model failed and the rule-based translator answered.
    pub fallback_reason: Option<TranslationError>,
}

/// Which translator serves the session.
#[derive(Debug)]
pub enum TranslatorBackend {
    ModelBacked(ModelTranslator),
    RuleBased(RuleTranslator),
}

impl TranslatorBackend {
    pub fn is_model_backed(&self) -> bool {
        matches!(self, Self::ModelBacked(_))
    }

    /// Human-readable name of the active backend.
    pub fn describe(&self) -> &str {
        match self {
            Self::ModelBacked(model) => model.model_name(),
            Self::RuleBased(_) => rules::RULE_MODEL_NAME,
        }
    }

    /// Translate one instruction, falling back to rules if the model fails.
    pub async fn translate(&self, request: &TranslationRequest<'_>) -> TranslationAttempt {
        match self {
            Self::RuleBased(rules) => TranslationAttempt {
                translation: rules.translate(request.instruction),
                fallback_reason: None,
            },
            Self::ModelBacked(model) => match model.translate(request).await {
                Ok(translation) => TranslationAttempt {
                    translation,
                    fallback_reason: None,
                },
                Err(e) => {
                    tracing::warn!("Model translation failed, falling back to rules: {}", e);
                    TranslationAttempt {
                        translation: RuleTranslator.translate(request.instruction),
                        fallback_reason: Some(e),
                    }
                }
            },
        }
    }
}
