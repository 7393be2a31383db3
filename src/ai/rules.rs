//! Rule-based fallback translator.
//!
//! Used when no model is available or the model fails. It only knows a
//! handful of phrasings and answers everything else as ambiguous.

use std::collections::BTreeMap;

use super::{CommandProposal, Translation, AMBIGUOUS_MARKER, META_MODEL};

pub const RULE_MODEL_NAME: &str = "rule-based-v1";

const RULE_CONFIDENCE: f32 = 0.5;

/// Instructions that map to a fixed command.
const FIXED_RULES: &[(&[&str], &str, &str)] = &[
    (&["list files", "list all files", "show files"], "ls -la", "Lists all files in the current directory"),
    (&["current directory", "where am i", "working directory"], "pwd", "Prints the working directory"),
    (&["disk usage", "disk space", "free space"], "df -h", "Shows disk usage per filesystem"),
    (&["who am i", "current user"], "whoami", "Prints the current user name"),
];

/// Leading verbs that take a single file or directory name.
const OPERAND_RULES: &[(&[&str], &str, &str)] = &[
    (&["show", "read", "print", "cat"], "cat", "Prints the contents of"),
    (&["delete", "remove"], "rm", "Moves to the trash"),
    (&["make directory", "create directory", "create folder", "mkdir"], "mkdir", "Creates the directory"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTranslator;

impl RuleTranslator {
    pub fn translate(&self, instruction: &str) -> Translation {
        let normalized = instruction.trim().to_lowercase();

        for (phrases, command, explanation) in FIXED_RULES {
            if phrases.iter().any(|p| normalized.contains(p)) {
                return Translation::Proposal(proposal(command, explanation, RULE_CONFIDENCE));
            }
        }

        for (prefixes, verb, explanation) in OPERAND_RULES {
            for prefix in *prefixes {
                let Some(rest) = normalized
                    .strip_prefix(*prefix)
                    .filter(|r| r.starts_with(char::is_whitespace))
                else {
                    continue;
                };
                let words: Vec<&str> = rest
                    .split_whitespace()
                    .filter(|w| !matches!(*w, "the" | "file" | "folder" | "directory" | "named"))
                    .collect();
                // Keep the operand's original casing.
                if let [operand] = words.as_slice() {
                    let original = original_word(instruction, operand);
                    return Translation::Proposal(proposal(
                        &format!("{} {}", verb, original),
                        &format!("{} {}", explanation, original),
                        RULE_CONFIDENCE,
                    ));
                }
            }
        }

        Translation::Ambiguous(proposal(
            AMBIGUOUS_MARKER,
            "The rule-based translator does not recognize this instruction.",
            0.0,
        ))
    }
}

fn original_word<'a>(instruction: &'a str, lowered: &'a str) -> &'a str {
    instruction
        .split_whitespace()
        .find(|w| w.to_lowercase() == lowered)
        .unwrap_or(lowered)
}

fn proposal(command: &str, explanation: &str, confidence: f32) -> CommandProposal {
    CommandProposal {
        raw_text: command.to_string(),
        explanation: explanation.to_string(),
        confidence,
        source_meta: BTreeMap::from([(META_MODEL.to_string(), RULE_MODEL_NAME.to_string())]),
        rule_fallback: true,
    }
}
