//! Which events start a workflow

use crate::helpers::*;
use workflow_runner::{RunStatus, SchedulingStrategy, TriggerEvent};

const FILTERED: &str = r#"
name: CI
on:
  push:
    branches: [main, "release/*"]
  pull_request:
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: cargo build
"#;

async fn run_event(yaml: &str, event: TriggerEvent) -> ScenarioResult {
    run_scenario(yaml, event, MockProvider::new(), SchedulingStrategy::default()).await
}

#[tokio::test]
async fn test_matching_push_runs() {
    let result = run_event(FILTERED, TriggerEvent::push("release/1.4")).await;

    assert_eq!(result.report.status, RunStatus::Succeeded);
    assert_eq!(result.scripts("build"), vec!["cargo build"]);
}

#[tokio::test]
async fn test_push_to_other_branch_is_not_triggered() {
    let result = run_event(FILTERED, TriggerEvent::push("feature/login")).await;

    assert_eq!(result.report.status, RunStatus::Skipped);
    assert!(result.report.jobs.is_empty());
    assert!(result.provider.commands().is_empty());
    assert!(result.report.is_success(), "an untriggered run is not a failure");
}

#[tokio::test]
async fn test_unfiltered_event_matches_any_branch() {
    let result = run_event(FILTERED, TriggerEvent::pull_request("feature/login")).await;
    assert_eq!(result.report.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_unlisted_event_is_not_triggered() {
    let result = run_event(FILTERED, TriggerEvent::new("schedule", None)).await;

    assert_eq!(result.report.status, RunStatus::Skipped);
    assert!(result.provider.commands().is_empty());
}

#[tokio::test]
async fn test_branches_ignore() {
    let yaml = r#"
name: CI
on:
  push:
    branches-ignore: ["wip/**"]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: cargo build
"#;

    let ignored = run_event(yaml, TriggerEvent::push("wip/parser/rewrite")).await;
    assert_eq!(ignored.report.status, RunStatus::Skipped);

    let built = run_event(yaml, TriggerEvent::push("main")).await;
    assert_eq!(built.report.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_event_list() {
    let yaml = r#"
name: CI
on: [push, workflow_dispatch]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: cargo build
"#;

    let dispatched = run_event(yaml, TriggerEvent::new("workflow_dispatch", None)).await;
    assert_eq!(dispatched.report.status, RunStatus::Succeeded);

    let pr = run_event(yaml, TriggerEvent::pull_request("main")).await;
    assert_eq!(pr.report.status, RunStatus::Skipped);
}
