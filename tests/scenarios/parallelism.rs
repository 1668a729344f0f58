//! Scheduling strategies and per-job isolation

use crate::helpers::*;
use std::collections::HashSet;
use std::time::Duration;
use workflow_runner::{SchedulingStrategy, TriggerEvent};

const INDEPENDENT: &str = r#"
name: Checks
on: push
jobs:
  fmt:
    runs-on: ubuntu-latest
    steps:
      - run: cargo fmt --check
  clippy:
    runs-on: ubuntu-latest
    steps:
      - run: cargo clippy
  audit:
    runs-on: ubuntu-latest
    steps:
      - run: cargo audit
"#;

async fn run_with(strategy: SchedulingStrategy) -> ScenarioResult {
    let provider = MockProvider::new().with_delay(Duration::from_millis(50));
    run_scenario(INDEPENDENT, TriggerEvent::push("main"), provider, strategy).await
}

#[tokio::test]
async fn test_parallel_runs_independent_jobs_together() {
    let result = run_with(SchedulingStrategy::Parallel).await;

    assert!(result.report.is_success());
    assert_eq!(result.provider.max_concurrent(), 3);
}

#[tokio::test]
async fn test_sequential_runs_one_job_at_a_time() {
    let result = run_with(SchedulingStrategy::Sequential).await;

    assert!(result.report.is_success());
    assert_eq!(result.provider.max_concurrent(), 1);
    assert_eq!(result.job_order(), vec!["fmt", "clippy", "audit"]);
}

#[tokio::test]
async fn test_limited_parallel_respects_limit() {
    let result = run_with(SchedulingStrategy::LimitedParallel(2)).await;

    assert!(result.report.is_success());
    assert_eq!(result.provider.max_concurrent(), 2);
    assert_eq!(result.report.jobs.len(), 3);
}

#[tokio::test]
async fn test_each_job_gets_its_own_environment() {
    let result = run_with(SchedulingStrategy::Parallel).await;

    let workspaces: HashSet<_> = result
        .provider
        .commands()
        .into_iter()
        .map(|c| (c.job, c.workspace))
        .collect();
    assert_eq!(workspaces.len(), 3);

    let paths: HashSet<_> = workspaces.into_iter().map(|(_, w)| w).collect();
    assert_eq!(paths.len(), 3, "jobs must not share a workspace");
    assert_eq!(result.provider.active(), 0);
}

#[tokio::test]
async fn test_job_env_does_not_leak_between_jobs() {
    let yaml = r#"
name: Isolation
on: push
jobs:
  first:
    runs-on: ubuntu-latest
    env:
      SECRET_MODE: enabled
    steps:
      - run: ./first
  second:
    runs-on: ubuntu-latest
    steps:
      - run: ./second
"#;

    let result = run_push(yaml, MockProvider::new()).await;

    let commands = result.provider.commands();
    let first = commands.iter().find(|c| c.job == "first").unwrap();
    let second = commands.iter().find(|c| c.job == "second").unwrap();
    assert_eq!(first.env["SECRET_MODE"], "enabled");
    assert!(!second.env.contains_key("SECRET_MODE"));
    assert_eq!(second.env["PIPELINE_JOB"], "second");
}
