use std::sync::Arc;

use pagewalk_e2e::mock::ManualClock;
use pagewalk_e2e::runner::{CaseStatus, ClassResult, ScenarioRunner};
use pagewalk_e2e::scenarios::{self, AuthenticationChecks, RunLifecycle, StorageLifecycle};
use pagewalk_e2e::testing::{console, MockConsole};
use pagewalk_e2e::Session;

fn session(console: &MockConsole, output: &std::path::Path) -> Session {
    let mut config = console::config();
    config.artifacts.output_dir = output.to_path_buf();
    Session::new(config, console.browser(), Arc::new(ManualClock::new()))
}

fn statuses(result: &ClassResult) -> Vec<(&str, CaseStatus)> {
    result.cases.iter().map(|c| (c.name.as_str(), c.status)).collect()
}

/// Storage Lifecycle
///
/// Creates a storage, uploads a file, renames and deletes it, then deletes
/// the storage. Nothing is left behind, so the cleanup pass finds the
/// storage already gone.
#[tokio::test]
async fn storage_lifecycle_passes_and_leaves_nothing_behind() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let session = session(&console, dir.path());
    let runner = ScenarioRunner::new(&session);

    let mut class = StorageLifecycle::new();
    let result = runner.run_class(&mut class).await;

    assert!(result.setup_error.is_none(), "{:?}", result.setup_error);
    assert!(
        result.cases.iter().all(|c| c.status == CaseStatus::Passed),
        "{:#?}",
        result.cases
    );
    assert!(result.teardown.is_clean());
    assert_eq!(result.teardown.already_absent.len(), 1);
    assert!(console.storage_names().is_empty());
}

/// A rejected upload fails its case and skips the cases built on it, while
/// the independent delete still runs.
#[tokio::test]
async fn rejected_upload_skips_dependent_cases() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let session = session(&console, dir.path());
    let runner = ScenarioRunner::new(&session);

    console.reject_uploads(true);
    let mut class = StorageLifecycle::new();
    let result = runner.run_class(&mut class).await;

    assert_eq!(
        statuses(&result),
        vec![
            ("create_storage", CaseStatus::Passed),
            ("upload_file", CaseStatus::Failed),
            ("rename_file", CaseStatus::Skipped),
            ("delete_file", CaseStatus::Skipped),
            ("delete_storage", CaseStatus::Passed),
        ]
    );
    let failed = &result.cases[1];
    assert!(failed.screenshot.as_ref().unwrap().starts_with(dir.path()));
    assert!(result.teardown.is_clean(), "{:?}", result.teardown.failures);
    assert!(console.storage_names().is_empty());
}

/// Authentication Checks
///
/// Valid login, a wrong password, impersonation and a blocked account. The
/// blocked account is unblocked again before the class finishes.
#[tokio::test]
async fn authentication_checks_pass() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let session = session(&console, dir.path());
    let runner = ScenarioRunner::new(&session);

    let mut class = AuthenticationChecks::new();
    let result = runner.run_class(&mut class).await;

    assert_eq!(
        statuses(&result),
        vec![
            ("valid_login", CaseStatus::Passed),
            ("invalid_password", CaseStatus::Passed),
            ("impersonation", CaseStatus::Passed),
            ("blocked_user", CaseStatus::Passed),
        ],
        "{:#?}",
        result.cases
    );
    assert!(!console.is_blocked("user"));
}

/// Run Lifecycle
///
/// Launches the configured tool, runs a command over its terminal, pauses,
/// resumes and stops it.
#[tokio::test]
async fn run_lifecycle_passes() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let session = session(&console, dir.path());
    let runner = ScenarioRunner::new(&session);

    let mut class = RunLifecycle::new(&session.config().scenarios);
    let result = runner.run_class(&mut class).await;

    assert!(
        result.cases.iter().all(|c| c.status == CaseStatus::Passed),
        "{:#?}",
        result.cases
    );
    let runs = console.run_ids();
    assert_eq!(runs.len(), 1);
    assert_eq!(
        console.run_status(&runs[0]).unwrap(),
        pagewalk_e2e::pages::RunStatus::Stopped
    );
    assert_eq!(session.tabs().await.unwrap().len(), 1);
}

/// A terminal check that never matches fails with the expected text in the
/// error, and the remaining cases still pause, resume and stop the run.
#[tokio::test]
async fn terminal_mismatch_does_not_block_the_rest() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let mut config = console::config();
    config.artifacts.output_dir = dir.path().to_path_buf();
    config.scenarios.ssh_expected = "never printed".to_string();
    let session = Session::new(config, console.browser(), Arc::new(ManualClock::new()));
    let runner = ScenarioRunner::new(&session);

    let mut class = RunLifecycle::new(&session.config().scenarios);
    let result = runner.run_class(&mut class).await;

    let status = statuses(&result);
    assert_eq!(status[1], ("ssh_command", CaseStatus::Failed));
    let error = result.cases[1].error.as_deref().unwrap();
    assert!(error.contains("never printed"), "{error}");

    assert_eq!(status[3], ("stop", CaseStatus::Passed));
    assert!(result.teardown.is_clean());
    assert_eq!(session.tabs().await.unwrap().len(), 1);
    let runs = console.run_ids();
    assert_eq!(
        console.run_status(&runs[0]).unwrap(),
        pagewalk_e2e::pages::RunStatus::Stopped
    );
}

#[tokio::test]
async fn full_builtin_suite_succeeds() {
    let console = MockConsole::new();
    let dir = tempfile::tempdir().unwrap();
    let session = session(&console, dir.path());
    let runner = ScenarioRunner::new(&session);

    let mut classes = scenarios::all(session.config());
    let suite = runner.run_suite(&mut classes).await;

    assert!(suite.success(), "{:#?}", suite.classes);
    assert_eq!(suite.cleanup_failures, 0);
    assert_eq!(suite.total, suite.passed);
}
