//! Prompt building utilities for translation requests.
//!
//! The model is asked for a single JSON object so that the reply can be parsed
//! without guessing; see [`super::parser`].

use super::TranslationRequest;

/// System prompt that defines the translator's behavior.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that translates natural language to shell commands.";

/// Build the user message for one instruction.
pub fn build_prompt(request: &TranslationRequest<'_>) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are a strict translator of English instructions into a command sequence for the '{}' operating system. \
         Only output JSON: {{\"command\":\"...\",\"explanation\":\"...\",\"confidence\":0.0}}. \
         If the instruction is ambiguous, return \"{}\" in command and provide explanation.\n",
        request.os_name,
        super::AMBIGUOUS_MARKER
    ));
    prompt.push_str(
        "Join multiple steps with ' && '. Do not use pipes, redirection, subshells or variables. \
         Only reference paths inside the current directory.\n",
    );

    if !request.history.is_empty() {
        prompt.push_str("\n--- Previous turns ---\n");
        for line in request.history {
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!(
        "\nUser: cwd={}, instruction = \"{}\"\n",
        request.cwd, request.instruction
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_basic() {
        let history = vec!["User: list files".to_string(), "Assistant: ls -la".to_string()];
        let request = TranslationRequest {
            instruction: "show the readme",
            cwd: "/home/user/project",
            os_name: "linux",
            history: &history,
        };

        let prompt = build_prompt(&request);

        assert!(prompt.contains("'linux' operating system"));
        assert!(prompt.contains("AMBIGUOUS"));
        assert!(prompt.contains("Previous turns"));
        assert!(prompt.contains("Assistant: ls -la"));
        assert!(prompt.contains("cwd=/home/user/project, instruction = \"show the readme\""));
    }

    #[test]
    fn test_build_prompt_without_history() {
        let request = TranslationRequest {
            instruction: "help me",
            cwd: "/",
            os_name: "macos",
            history: &[],
        };

        let prompt = build_prompt(&request);

        assert!(!prompt.contains("Previous turns"));
        assert!(prompt.contains("instruction = \"help me\""));
    }
}
