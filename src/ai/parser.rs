//! Parser module for processing model replies.
//!
//! Turns the model's text into a [`Translation`]. The reply is expected to be
//! a JSON object, but models often wrap it in a code block or prose, so
//! several shapes are tried in order.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{CommandProposal, Translation, TranslationError, AMBIGUOUS_MARKER, META_MODEL};

#[derive(Debug, Deserialize)]
struct ReplyJson {
    #[serde(default)]
    command: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    confidence: f32,
}

/// Parse a model reply produced by `model_name`.
///
/// Accepts, in order: the bare JSON object, the object inside a fenced code
/// block, and the outermost `{...}` span embedded in prose. Missing fields
/// default and confidence is clamped to `[0, 1]`.
pub fn parse_reply(response: &str, model_name: &str) -> Result<Translation, TranslationError> {
    let reply = parse_bare(response)
        .or_else(|| parse_code_block(response))
        .or_else(|| parse_embedded(response))
        .ok_or_else(|| TranslationError::Unparseable(response.trim().to_string()))?;

    let command = reply.command.trim().to_string();
    let proposal = CommandProposal {
        raw_text: command.clone(),
        explanation: reply.explanation.trim().to_string(),
        confidence: clamp_confidence(reply.confidence),
        source_meta: BTreeMap::from([(META_MODEL.to_string(), model_name.to_string())]),
        rule_fallback: false,
    };

    if command == AMBIGUOUS_MARKER {
        Ok(Translation::Ambiguous(proposal))
    } else {
        Ok(Translation::Proposal(proposal))
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn parse_bare(response: &str) -> Option<ReplyJson> {
    serde_json::from_str(response.trim()).ok()
}

/// Parse JSON from a markdown code block
fn parse_code_block(response: &str) -> Option<ReplyJson> {
    let mut in_code_block = false;
    let mut body = String::new();

    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_code_block {
                break;
            }
            in_code_block = true;
        } else if in_code_block {
            body.push_str(trimmed);
            body.push('\n');
        }
    }

    if body.is_empty() {
        None
    } else {
        serde_json::from_str(&body).ok()
    }
}

/// Parse the outermost `{...}` span inside prose
fn parse_embedded(response: &str) -> Option<ReplyJson> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}
