//! End-to-end turns through the safety pipeline, checked against the audit log.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusty_nlsh::ai::{RuleTranslator, TranslationError, AMBIGUOUS_MARKER};
use rusty_nlsh::app::{App, AppContext, Interaction};
use rusty_nlsh::audit::{AuditTrail, ExecutionOutcome};
use rusty_nlsh::config::Config;
use rusty_nlsh::pipeline::{Approver, Decision, PendingReview, SafetyPipeline, TurnOutcome, TurnReport};
use rusty_nlsh::security::{ExecutionDecision, TrashInterceptor, DANGEROUS_COMMAND};
use rusty_nlsh::shell::CommandRunner;
use rusty_nlsh::{CommandProposal, Translation, TranslatorBackend};
use tempfile::TempDir;

/// Records every command instead of running it.
#[derive(Default)]
struct RecordingRunner {
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandRunner for &RecordingRunner {
    async fn run(&self, command: &str, _description: &str, _cwd: &Path) -> ExecutionOutcome {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        ExecutionOutcome::Completed {
            stdout: format!("ran {}\n", command),
            stderr: String::new(),
            exit_status: Some(0),
        }
    }
}

/// Answers reviews from a fixed script and declines once it runs out.
/// Option menus take the proposal itself unless `choices` says otherwise.
#[derive(Default)]
struct Scripted {
    decisions: VecDeque<Decision>,
    choices: VecDeque<Option<usize>>,
    offered: Vec<Vec<String>>,
    reviewed: Vec<String>,
    dangerous: Vec<bool>,
    finished: usize,
}

impl Scripted {
    fn answering(decisions: &[Decision]) -> Self {
        Self {
            decisions: decisions.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl Approver for Scripted {
    fn decide(&mut self, review: &PendingReview<'_>) -> Decision {
        self.reviewed.push(review.command.to_string());
        self.dangerous.push(review.is_dangerous());
        self.decisions.pop_front().unwrap_or(Decision::Decline)
    }
}

impl Interaction for Scripted {
    fn read_instruction(&mut self) -> Option<String> {
        None
    }

    fn translation_fallback(&mut self, _error: &TranslationError) {}

    fn choose_option(&mut self, _proposal: &CommandProposal, options: &[String]) -> Option<usize> {
        self.offered.push(options.to_vec());
        self.choices.pop_front().unwrap_or(Some(0))
    }

    fn turn_finished(&mut self, _report: &TurnReport) {
        self.finished += 1;
    }
}

struct Fixture {
    dir: TempDir,
    work: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        Self { dir, work }
    }

    fn trash_dir(&self) -> PathBuf {
        self.dir.path().join("trash")
    }

    fn audit_path(&self) -> PathBuf {
        self.dir.path().join("audit").join("audit_log.jsonl")
    }

    fn pipeline<'r>(&self, runner: &'r RecordingRunner) -> SafetyPipeline<&'r RecordingRunner> {
        let trash = TrashInterceptor::new(self.trash_dir()).unwrap();
        let audit = AuditTrail::open(self.audit_path()).unwrap();
        SafetyPipeline::new(trash, audit, runner).with_actor("tester")
    }

    fn records(&self) -> Vec<rusty_nlsh::AuditRecord> {
        AuditTrail::open(self.audit_path()).unwrap().read_all().unwrap()
    }
}

fn proposal(command: &str, confidence: f32) -> Translation {
    Translation::Proposal(CommandProposal {
        raw_text: command.to_string(),
        explanation: format!("runs {}", command),
        confidence,
        source_meta: BTreeMap::from([("model".to_string(), "test-model".to_string())]),
        rule_fallback: false,
    })
}

#[tokio::test]
async fn test_escape_is_rejected_before_approval() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve]);

    let report = pipeline
        .process("remove etc", &proposal("rm -rf /etc", 0.9), &fx.work, &mut approver)
        .await;

    assert!(matches!(report.outcome, TurnOutcome::Rejected(_)));
    assert!(approver.reviewed.is_empty());
    assert!(runner.commands().is_empty());

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].approved);
    assert!(records[0].execution_outcome.is_none());
    assert!(records[0].safety_flags.contains(DANGEROUS_COMMAND));
    assert!(records[0].rejection.as_deref().unwrap_or_default().contains("/etc"));
    assert_eq!(records[0], report.record);
}

#[tokio::test]
async fn test_declined_command_is_recorded_unapproved() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Decline]);

    let report = pipeline
        .process("list files", &proposal("ls -la", 0.9), &fx.work, &mut approver)
        .await;

    assert!(matches!(report.outcome, TurnOutcome::Declined));
    assert_eq!(approver.reviewed, vec!["ls -la"]);
    assert!(runner.commands().is_empty());

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].approved);
    assert!(records[0].execution_outcome.is_none());
    assert_eq!(records[0].chosen_command, "ls -la");
    assert_eq!(records[0].actor, "tester");
}

#[tokio::test]
async fn test_approved_command_runs_sanitized() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve]);

    let report = pipeline
        .process(
            "show notes then list",
            &proposal("cat notes.txt &&   ls -la", 0.9),
            &fx.work,
            &mut approver,
        )
        .await;

    assert!(matches!(
        report.outcome,
        TurnOutcome::Executed(ExecutionOutcome::Completed { .. })
    ));
    assert_eq!(runner.commands(), vec!["cat notes.txt && ls -la"]);
    assert_eq!(approver.dangerous, vec![false]);

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].approved);
    assert_eq!(records[0].chosen_command, "cat notes.txt && ls -la");
    assert_eq!(
        records[0].model_meta.get("model").map(String::as_str),
        Some("test-model")
    );
    assert!(records[0]
        .execution_outcome
        .as_ref()
        .is_some_and(ExecutionOutcome::is_success));
}

#[tokio::test]
async fn test_dangerous_command_still_reaches_approval() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Decline]);

    pipeline
        .process("turn it off", &proposal("shutdown now", 0.95), &fx.work, &mut approver)
        .await;

    assert_eq!(approver.dangerous, vec![true]);
    let records = fx.records();
    assert_eq!(
        records[0].safety_flags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec![DANGEROUS_COMMAND]
    );
}

#[tokio::test]
async fn test_removal_goes_to_trash_instead_of_shell() {
    let fx = Fixture::new();
    fs::write(fx.work.join("notes.txt"), "keep me").unwrap();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve]);

    let report = pipeline
        .process("delete notes.txt", &proposal("rm notes.txt", 0.9), &fx.work, &mut approver)
        .await;

    let destination = fx.trash_dir().join("notes.txt");
    match &report.outcome {
        TurnOutcome::TrashIntercepted(ExecutionDecision::Trashed { file, destination: d }) => {
            assert_eq!(file, "notes.txt");
            assert_eq!(d, &destination);
        }
        other => panic!("Expected a trashed file, got {:?}", other),
    }
    assert!(runner.commands().is_empty());
    assert!(!fx.work.join("notes.txt").exists());
    assert_eq!(fs::read_to_string(&destination).unwrap(), "keep me");

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].approved);
    assert_eq!(
        records[0].execution_outcome,
        Some(ExecutionOutcome::trashed("notes.txt", destination))
    );
}

#[tokio::test]
async fn test_second_removal_of_same_name_keeps_both() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve, Decision::Approve]);

    for content in ["first", "second"] {
        fs::write(fx.work.join("a.txt"), content).unwrap();
        pipeline
            .process("delete a.txt", &proposal("rm a.txt", 0.9), &fx.work, &mut approver)
            .await;
    }

    assert_eq!(fs::read_to_string(fx.trash_dir().join("a.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(fx.trash_dir().join("a.txt.1")).unwrap(), "second");
    assert_eq!(fx.records().len(), 2);
}

#[tokio::test]
async fn test_removal_of_missing_file_fails_without_shell() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve]);

    let report = pipeline
        .process("delete ghost", &proposal("rm ghost.txt", 0.9), &fx.work, &mut approver)
        .await;

    assert!(matches!(
        report.outcome,
        TurnOutcome::TrashIntercepted(ExecutionDecision::NotFound { .. })
    ));
    assert!(runner.commands().is_empty());

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].approved);
    assert_eq!(
        records[0].execution_outcome,
        Some(ExecutionOutcome::failed("File not found: ghost.txt"))
    );
}

#[tokio::test]
async fn test_ambiguous_translation_is_recorded_without_review() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve]);

    let translation = Translation::Ambiguous(CommandProposal {
        raw_text: AMBIGUOUS_MARKER.to_string(),
        explanation: "Which files?".to_string(),
        confidence: 0.2,
        source_meta: BTreeMap::new(),
        rule_fallback: true,
    });
    let report = pipeline
        .process("do the thing", &translation, &fx.work, &mut approver)
        .await;

    assert!(matches!(report.outcome, TurnOutcome::Ambiguous));
    assert!(approver.reviewed.is_empty());

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].approved);
    assert!(records[0].execution_outcome.is_none());
    assert!(records[0].rule_fallback);
    assert_eq!(records[0].chosen_command, AMBIGUOUS_MARKER);
}

#[tokio::test]
async fn test_records_accumulate_in_order() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let pipeline = fx.pipeline(&runner);
    let mut approver = Scripted::answering(&[Decision::Approve, Decision::Decline]);

    let mut ids = Vec::new();
    for (instruction, command) in [("where am i", "pwd"), ("list", "ls"), ("escape", "cat ../../x")] {
        let report = pipeline
            .process(instruction, &proposal(command, 0.9), &fx.work, &mut approver)
            .await;
        assert!(report.audit_error.is_none());
        ids.push(report.record.id);
    }

    let records = fx.records();
    let read_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(read_ids, ids);
    assert_eq!(
        records.iter().map(|r| r.approved).collect::<Vec<_>>(),
        vec![true, false, false]
    );
}

fn rule_based_app<'r>(fx: &Fixture, runner: &'r RecordingRunner) -> App<&'r RecordingRunner> {
    let config = Config {
        model_path: fx.dir.path().join("missing.gguf"),
        audit_log: fx.audit_path(),
        trash_dir: fx.trash_dir(),
        ..Config::default()
    };
    let context = AppContext {
        config,
        translator: TranslatorBackend::RuleBased(RuleTranslator),
    };
    App::with_runner(context, runner).unwrap()
}

#[tokio::test]
async fn test_app_runs_each_step_separately() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let mut app = rule_based_app(&fx, &runner);
    let mut ui = Scripted::answering(&[Decision::Approve, Decision::Approve]);

    let reports = app
        .handle_instruction("make directory out and then list files", &fx.work, &mut ui)
        .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(ui.finished, 2);
    // Rule-based proposals are below the confidence threshold.
    assert_eq!(ui.offered.len(), 2);
    assert_eq!(ui.offered[0][0], "mkdir out");
    assert_eq!(ui.reviewed, vec!["mkdir out", "ls -la"]);
    assert_eq!(runner.commands(), vec!["mkdir out", "ls -la"]);
    assert_eq!(app.history().len(), 4);

    let records = fx.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.approved && r.rule_fallback));
}

#[tokio::test]
async fn test_low_confidence_option_is_translated_again() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let mut app = rule_based_app(&fx, &runner);
    let mut ui = Scripted::answering(&[Decision::Approve]);
    ui.choices.push_back(Some(3));

    let reports = app.handle_instruction("list files", &fx.work, &mut ui).await;

    assert_eq!(reports.len(), 1);
    assert_eq!(ui.offered.len(), 1);
    assert_eq!(ui.offered[0][3], "Read a file");
    assert_eq!(ui.reviewed, vec!["cat a"]);
    assert_eq!(runner.commands(), vec!["cat a"]);

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].input_text, "Read a file");
    assert_eq!(records[0].chosen_command, "cat a");
}

#[tokio::test]
async fn test_cancelled_option_menu_is_recorded_declined() {
    let fx = Fixture::new();
    let runner = RecordingRunner::default();
    let mut app = rule_based_app(&fx, &runner);
    let mut ui = Scripted::answering(&[Decision::Approve]);
    ui.choices.push_back(None);

    let reports = app.handle_instruction("list files", &fx.work, &mut ui).await;

    assert!(matches!(reports[0].outcome, TurnOutcome::Declined));
    assert!(ui.reviewed.is_empty());
    assert!(runner.commands().is_empty());
    assert!(app.history().is_empty());

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].approved);
    assert!(records[0].execution_outcome.is_none());
    assert_eq!(records[0].chosen_command, "ls -la");
}
