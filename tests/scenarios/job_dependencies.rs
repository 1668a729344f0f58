//! `needs:` ordering and skipping of dependents

use crate::helpers::*;
use std::time::Duration;
use workflow_runner::{ExecutionEvent, JobState, RunStatus};

const CHAIN: &str = r#"
name: Release
on: push
jobs:
  package:
    runs-on: ubuntu-latest
    needs: test
    steps:
      - run: cargo package
  test:
    runs-on: ubuntu-latest
    needs: [build]
    steps:
      - run: cargo test
  build:
    runs-on: ubuntu-latest
    steps:
      - run: cargo build
  lint:
    runs-on: ubuntu-latest
    steps:
      - run: cargo clippy
"#;

#[tokio::test]
async fn test_needs_run_first() {
    let provider = MockProvider::new().with_delay(Duration::from_millis(10));
    let result = run_push(CHAIN, provider).await;

    assert!(result.report.is_success());
    assert_ran_before(&result, "build", "test");
    assert_ran_before(&result, "test", "package");
}

#[tokio::test]
async fn test_report_lists_jobs_in_execution_order() {
    let result = run_push(CHAIN, MockProvider::new()).await;

    let ids: Vec<&str> = result
        .report
        .jobs
        .iter()
        .map(|j| j.job_id.as_str())
        .collect();
    assert_eq!(ids, vec!["build", "test", "package", "lint"]);
}

#[tokio::test]
async fn test_failed_need_skips_dependents_transitively() {
    let provider = MockProvider::new().fail_when("cargo build", 101);
    let result = run_push(CHAIN, provider).await;

    assert_job_failed_at(&result, "build", 0);
    assert_job_skipped(&result, "test");
    assert_job_skipped(&result, "package");
    assert_job_succeeded(&result, "lint");

    assert!(result.scripts("test").is_empty());
    assert!(result.scripts("package").is_empty());
    assert_eq!(result.report.status, RunStatus::Failed);

    match result.state("package") {
        JobState::Skipped { reason } => assert!(reason.contains("'test'"), "reason: {}", reason),
        other => panic!("package should be skipped, got {:?}", other),
    }

    let skipped: Vec<&str> = result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::JobSkipped { job, .. } => Some(job.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["test", "package"]);
}

#[tokio::test]
async fn test_diamond_waits_for_both_needs() {
    let yaml = r#"
name: Diamond
on: push
jobs:
  setup:
    runs-on: ubuntu-latest
    steps:
      - run: ./setup
  unit:
    runs-on: ubuntu-latest
    needs: setup
    steps:
      - run: ./unit
  integration:
    runs-on: ubuntu-latest
    needs: setup
    steps:
      - run: ./integration
  report:
    runs-on: ubuntu-latest
    needs: [unit, integration]
    steps:
      - run: ./report
"#;

    let provider = MockProvider::new().with_delay(Duration::from_millis(10));
    let result = run_push(yaml, provider).await;

    assert!(result.report.is_success());
    assert_ran_before(&result, "setup", "unit");
    assert_ran_before(&result, "setup", "integration");
    assert_ran_before(&result, "unit", "report");
    assert_ran_before(&result, "integration", "report");
}

#[tokio::test]
async fn test_one_failed_need_is_enough_to_skip() {
    let yaml = r#"
name: Diamond
on: push
jobs:
  unit:
    runs-on: ubuntu-latest
    steps:
      - run: ./unit
  integration:
    runs-on: ubuntu-latest
    steps:
      - run: ./integration
  report:
    runs-on: ubuntu-latest
    needs: [unit, integration]
    steps:
      - run: ./report
"#;

    let provider = MockProvider::new().fail_when("./integration", 1);
    let result = run_push(yaml, provider).await;

    assert_job_succeeded(&result, "unit");
    assert_job_failed_at(&result, "integration", 0);
    assert_job_skipped(&result, "report");
}
