//! Application state management.
//!
//! [`AppContext`] is built once at startup from the configuration and is
//! read-only afterwards. [`App`] owns it together with the safety pipeline and
//! the session's interaction history, and drives one instruction at a time
//! from translation to the recorded outcome.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::ai::{
    CommandProposal, ModelTranslator, RuleTranslator, Translation, TranslationAttempt,
    TranslationError, TranslationRequest, TranslatorBackend,
};
use crate::audit::AuditTrail;
use crate::config::Config;
use crate::context::{ContextSnapshot, History};
use crate::pipeline::{Approver, Decision, PendingReview, SafetyPipeline, TurnReport};
use crate::security::TrashInterceptor;
use crate::shell::{CommandRunner, ShellRunner};

static STEP_SEPARATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\band then\b").ok());

/// Generic tasks offered after the proposal itself when confidence is low.
pub const FALLBACK_OPTIONS: &[&str] = &[
    "Search for files",
    "Create a new file",
    "Read a file",
    "Write to a file",
];

/// Process-wide, read-only context.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub translator: TranslatorBackend,
}

impl AppContext {
    /// Pick the translator: model-backed iff the model file exists.
    pub fn from_config(config: Config) -> Self {
        let translator = if config.model_path.exists() {
            tracing::info!("Using model {} at {}", config.model_name(), config.api_base);
            TranslatorBackend::ModelBacked(ModelTranslator::new(&config.api_base, config.model_name()))
        } else {
            tracing::warn!(
                "Model file not found at {}, using rule-based translation",
                config.model_path.display()
            );
            TranslatorBackend::RuleBased(RuleTranslator)
        };
        Self { config, translator }
    }
}

/// The user-facing side of a session.
pub trait Interaction: Approver {
    /// Next instruction, or `None` to end the session.
    fn read_instruction(&mut self) -> Option<String>;

    /// The model failed and the rule-based translator answered instead.
    fn translation_fallback(&mut self, error: &TranslationError);

    /// Offer `options` for a low-confidence `proposal`. Option 0 is the
    /// proposal's own command. `None` cancels the step.
    fn choose_option(&mut self, proposal: &CommandProposal, options: &[String]) -> Option<usize>;

    fn turn_finished(&mut self, report: &TurnReport);
}

pub struct App<R = ShellRunner> {
    context: AppContext,
    pipeline: SafetyPipeline<R>,
    history: History,
}

impl App<ShellRunner> {
    pub fn new(context: AppContext) -> Result<Self> {
        Self::with_runner(context, ShellRunner)
    }
}

impl<R: CommandRunner> App<R> {
    /// Set up the trash directory and audit log, then the pipeline.
    pub fn with_runner(context: AppContext, runner: R) -> Result<Self> {
        let trash = TrashInterceptor::new(&context.config.trash_dir).with_context(|| {
            format!(
                "Failed to create trash directory {}",
                context.config.trash_dir.display()
            )
        })?;
        let audit = AuditTrail::open(&context.config.audit_log)?;
        let pipeline = SafetyPipeline::new(trash, audit, runner)
            .with_confidence_threshold(context.config.confidence_threshold);

        Ok(Self {
            context,
            pipeline,
            history: History::new(),
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Read instructions until the user leaves.
    pub async fn run<I: Interaction>(&mut self, ui: &mut I) -> Result<()> {
        while let Some(line) = ui.read_instruction() {
            let instruction = line.trim();
            if instruction.is_empty() {
                continue;
            }
            if is_exit(instruction) {
                break;
            }

            let cwd: PathBuf = std::env::current_dir().context("Failed to read current directory")?;
            self.handle_instruction(instruction, &cwd, ui).await;
        }
        tracing::info!("Session ended");
        Ok(())
    }

    /// Translate and process every step of `instruction` in `cwd`.
    pub async fn handle_instruction<I: Interaction>(
        &mut self,
        instruction: &str,
        cwd: &Path,
        ui: &mut I,
    ) -> Vec<TurnReport> {
        let mut reports = Vec::new();
        for step in split_steps(instruction) {
            let report = self.handle_step(step, cwd, ui).await;
            ui.turn_finished(&report);
            reports.push(report);
        }
        reports
    }

    async fn handle_step<I: Interaction>(
        &mut self,
        mut step: String,
        cwd: &Path,
        ui: &mut I,
    ) -> TurnReport {
        let mut translation = self.translate(&step, cwd, ui).await;

        // Low confidence: let the user pick the proposal or a generic task.
        if let Translation::Proposal(proposal) = &translation {
            if proposal.confidence < self.context.config.confidence_threshold {
                let options = low_confidence_options(proposal);
                match ui.choose_option(proposal, &options) {
                    // The proposal itself goes on unchanged.
                    Some(0) => {}
                    Some(n) if n < options.len() => {
                        step = options[n].clone();
                        translation = self.translate(&step, cwd, ui).await;
                    }
                    _ => {
                        tracing::info!("Low-confidence step '{}' cancelled", step);
                        return self.pipeline.process(&step, &translation, cwd, &mut Cancelled).await;
                    }
                }
            }
        }

        if let Translation::Proposal(proposal) = &translation {
            self.history.push_turn(&step, &proposal.raw_text);
        }
        self.pipeline.process(&step, &translation, cwd, ui).await
    }

    async fn translate<I: Interaction>(&self, step: &str, cwd: &Path, ui: &mut I) -> Translation {
        let snapshot = ContextSnapshot::new(cwd, &self.history, self.context.config.history_limit);
        let request = TranslationRequest {
            instruction: step,
            cwd: &snapshot.cwd,
            os_name: &snapshot.os_name,
            history: &snapshot.recent_history,
        };

        let TranslationAttempt {
            translation,
            fallback_reason,
        } = self.context.translator.translate(&request).await;
        if let Some(error) = &fallback_reason {
            ui.translation_fallback(error);
        }
        translation
    }
}

/// Declines without asking; used when the user backs out of the option menu.
struct Cancelled;

impl Approver for Cancelled {
    fn decide(&mut self, _review: &PendingReview<'_>) -> Decision {
        Decision::Decline
    }
}

/// The proposal's command followed by [`FALLBACK_OPTIONS`].
pub fn low_confidence_options(proposal: &CommandProposal) -> Vec<String> {
    std::iter::once(proposal.raw_text.clone())
        .chain(FALLBACK_OPTIONS.iter().map(|o| o.to_string()))
        .collect()
}

fn is_exit(instruction: &str) -> bool {
    matches!(instruction.to_lowercase().as_str(), "exit" | "quit")
}

/// Split on "and then" (any case) into trimmed, non-empty steps.
pub fn split_steps(instruction: &str) -> Vec<String> {
    let pieces: Vec<&str> = match STEP_SEPARATOR.as_ref() {
        Some(re) => re.split(instruction).collect(),
        None => vec![instruction],
    };
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
