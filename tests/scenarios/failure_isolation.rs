//! A failing step stops its job and nothing else

use crate::helpers::*;
use workflow_runner::core::StepOutcome;
use workflow_runner::{JobState, RunStatus, SchedulingStrategy, TriggerEvent};

const THREE_JOBS: &str = r#"
name: CI
on: push
jobs:
  lint:
    runs-on: ubuntu-latest
    steps:
      - run: cargo fmt --check
      - run: cargo clippy
  test:
    runs-on: ubuntu-latest
    steps:
      - run: cargo build
      - run: cargo test
      - run: cargo test --doc
  docs:
    runs-on: ubuntu-latest
    steps:
      - run: cargo doc
"#;

#[tokio::test]
async fn test_failing_step_stops_remaining_steps() {
    let provider = MockProvider::new().fail_when("cargo test", 101);
    let result = run_push(THREE_JOBS, provider).await;

    assert_job_failed_at(&result, "test", 1);
    assert_eq!(result.scripts("test"), vec!["cargo build", "cargo test"]);

    let report = result.report.job("test").unwrap();
    let outcomes: Vec<StepOutcome> = report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(
        outcomes,
        vec![StepOutcome::Succeeded, StepOutcome::Failed, StepOutcome::NotRun]
    );
    assert_eq!(report.steps[1].exit_code, Some(101));
    assert_eq!(report.failed_step().map(|s| s.name.as_str()), Some("Run cargo test"));
}

#[tokio::test]
async fn test_independent_jobs_unaffected_by_failure() {
    let provider = MockProvider::new().fail_when("cargo test", 101);
    let result = run_push(THREE_JOBS, provider).await;

    assert_job_succeeded(&result, "lint");
    assert_job_succeeded(&result, "docs");
    assert_eq!(result.scripts("lint"), vec!["cargo fmt --check", "cargo clippy"]);
    assert_eq!(result.scripts("docs"), vec!["cargo doc"]);

    assert_eq!(result.report.status, RunStatus::Failed);
    assert!(!result.report.is_success());
}

#[tokio::test]
async fn test_failure_isolation_holds_sequentially() {
    let provider = MockProvider::new().fail_when("cargo fmt", 1);
    let result = run_scenario(
        THREE_JOBS,
        TriggerEvent::push("main"),
        provider,
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_job_failed_at(&result, "lint", 0);
    assert_eq!(result.scripts("lint"), vec!["cargo fmt --check"]);
    assert_job_succeeded(&result, "test");
    assert_job_succeeded(&result, "docs");
}

#[tokio::test]
async fn test_every_job_may_fail_on_its_own() {
    let provider = MockProvider::new()
        .fail_when("clippy", 1)
        .fail_when("cargo doc", 2);
    let result = run_push(THREE_JOBS, provider).await;

    assert_job_failed_at(&result, "lint", 1);
    assert_job_succeeded(&result, "test");
    assert_job_failed_at(&result, "docs", 0);
    assert_eq!(result.report.job("docs").unwrap().steps[0].exit_code, Some(2));
}

#[tokio::test]
async fn test_unprovisionable_job_fails_alone() {
    let yaml = r#"
name: Matrix
on: push
jobs:
  linux:
    runs-on: ubuntu-latest
    steps:
      - run: make
  windows:
    runs-on: windows-latest
    steps:
      - run: nmake
      - run: nmake check
"#;

    let provider = MockProvider::new().reject_label("windows-latest");
    let result = run_push(yaml, provider).await;

    assert_job_succeeded(&result, "linux");
    match result.state("windows") {
        JobState::Failed { error, failed_step, .. } => {
            assert_eq!(*failed_step, None);
            assert!(error.contains("windows-latest"), "error was: {}", error);
        }
        other => panic!("windows should have failed, got {:?}", other),
    }
    assert!(result.scripts("windows").is_empty());

    let steps = &result.report.job("windows").unwrap().steps;
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s.outcome == StepOutcome::NotRun));
}

#[tokio::test]
async fn test_failed_job_still_tears_down() {
    let provider = MockProvider::new().fail_when("cargo build", 1);
    let result = run_push(THREE_JOBS, provider).await;

    assert_job_failed_at(&result, "test", 0);
    assert_eq!(result.provider.active(), 0);
}
