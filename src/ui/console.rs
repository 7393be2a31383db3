//! Line-oriented console front end.
//!
//! Prints reviews and outcomes with `crossterm` styling and reads answers
//! from stdin. End of input counts as declining / leaving.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;

use crate::ai::{CommandProposal, TranslationError};
use crate::app::Interaction;
use crate::audit::ExecutionOutcome;
use crate::pipeline::{Approver, Decision, PendingReview, TurnOutcome, TurnReport};
use crate::security::ExecutionDecision;

pub struct ConsoleUi<In = io::StdinLock<'static>> {
    input: In,
}

impl ConsoleUi {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<In: BufRead> ConsoleUi<In> {
    pub fn with_input(input: In) -> Self {
        Self { input }
    }

    pub fn print_banner(&self, backend: &str) {
        println!("{}", "Welcome to rusty-nlsh!".cyan().bold());
        println!("Type your natural language command or 'exit' to quit.");
        println!("Translator: {}", backend.magenta());
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        print!("{}", text);
        if let Err(e) = io::stdout().flush() {
            tracing::warn!("Failed to flush stdout: {}", e);
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                None
            }
        }
    }

    fn print_outcome(&self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Completed { stdout, stderr, .. } => {
                println!("{}", "── Command Output ──".green());
                print!("{}", stdout);
                if !stderr.is_empty() {
                    println!("{}", "── Error Output ──".red());
                    print!("{}", stderr);
                }
            }
            ExecutionOutcome::Failed { error, stderr } => {
                println!("{} {}", "Error executing command:".red().bold(), error);
                if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
                    println!("{}", "── Error Output ──".red());
                    print!("{}", stderr);
                }
            }
            ExecutionOutcome::Trashed {
                file, destination, ..
            } => {
                println!("Moved '{}' to '{}'.", file, destination.display());
            }
        }
    }

    fn print_trash_decision(&self, decision: &ExecutionDecision) {
        match decision {
            ExecutionDecision::Trashed { file, destination } => {
                println!("Moved '{}' to '{}'.", file, destination.display());
            }
            ExecutionDecision::NotFound { file } => {
                println!("{}", format!("Error: File not found - {}", file).red());
            }
            ExecutionDecision::MoveFailed { file, error } => {
                println!("{}", format!("Error moving '{}' to trash: {}", file, error).red());
            }
            ExecutionDecision::InvalidCommand { reason } => {
                println!("{}", reason.as_str().red());
            }
            ExecutionDecision::PassThrough => {}
        }
    }
}

fn label(name: &str) -> impl std::fmt::Display {
    format!("{:<12}", name).cyan()
}

impl<In: BufRead> Approver for ConsoleUi<In> {
    fn decide(&mut self, review: &PendingReview<'_>) -> Decision {
        let model = review
            .proposal
            .source_meta
            .get(crate::ai::META_MODEL)
            .map(String::as_str)
            .unwrap_or("unknown");

        println!("{}", "── Command Interpretation ──".cyan().bold());
        println!("{} {}", label("Command"), review.command.magenta().bold());
        println!("{} {}", label("Explanation"), review.proposal.explanation);
        println!("{} {:.2}", label("Confidence"), review.proposal.confidence);
        println!("{} {}", label("Model"), model);

        if review.is_dangerous() {
            println!(
                "{} The command is considered potentially dangerous.",
                "Security Alert:".yellow().bold()
            );
        }
        if review.low_confidence {
            println!(
                "{}",
                "Could not interpret the instruction with high confidence; check the command carefully."
                    .yellow()
            );
        }

        match self.prompt("Run this command? (y/n): ") {
            Some(answer) if answer.trim().eq_ignore_ascii_case("y") => Decision::Approve,
            _ => Decision::Decline,
        }
    }
}

impl<In: BufRead> Interaction for ConsoleUi<In> {
    fn read_instruction(&mut self) -> Option<String> {
        let line = self.prompt(&format!("{} ", ">".green().bold()));
        if line.is_none() {
            println!();
            println!("{}", "Exiting...".cyan().bold());
        }
        line
    }

    fn choose_option(&mut self, proposal: &CommandProposal, options: &[String]) -> Option<usize> {
        println!(
            "{}",
            "Could not interpret the command with high confidence. Here are some options:".yellow()
        );
        println!("{} (confidence {:.2})", "── Command Options ──".cyan().bold(), proposal.confidence);
        for (i, option) in options.iter().enumerate() {
            println!("{} {}", format!("{:>3}", i + 1).cyan(), option.as_str().magenta());
        }

        // Options are shown 1-based; anything else cancels.
        let answer = self.prompt("Select an option (or press enter to cancel): ")?;
        match answer.trim().parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => Some(n - 1),
            _ => None,
        }
    }

    fn translation_fallback(&mut self, error: &TranslationError) {
        println!(
            "{}",
            format!("Error calling model: {}, falling back to rule-based.", error).yellow()
        );
    }

    fn turn_finished(&mut self, report: &TurnReport) {
        match &report.outcome {
            TurnOutcome::Ambiguous => {
                println!(
                    "{}",
                    format!("The command is ambiguous. {}", report.record.explanation).yellow()
                );
                println!("{}", "Please rephrase with more details.".yellow());
            }
            TurnOutcome::Rejected(reason) => {
                println!("{}", reason.to_string().red().bold());
            }
            TurnOutcome::Declined => {
                println!("{}", "Command not executed.".yellow());
            }
            TurnOutcome::Executed(outcome) => self.print_outcome(outcome),
            TurnOutcome::TrashIntercepted(decision) => self.print_trash_decision(decision),
        }

        if let Some(e) = &report.audit_error {
            println!(
                "{} {}",
                "Audit log write failed; this action is not recorded:".red().bold(),
                e
            );
        }
    }
}
