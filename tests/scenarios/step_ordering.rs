//! Steps of a job run in declaration order on one environment

use crate::helpers::*;
use std::path::PathBuf;
use workflow_runner::ExecutionEvent;

#[tokio::test]
async fn test_steps_run_in_declared_order() {
    let yaml = r#"
name: Build
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: cargo fetch
      - run: cargo build
      - run: cargo test
"#;

    let result = run_push(yaml, MockProvider::new()).await;

    assert!(result.report.is_success());
    assert_job_succeeded(&result, "build");
    assert_eq!(
        result.scripts("build"),
        vec!["cargo fetch", "cargo build", "cargo test"]
    );
}

#[tokio::test]
async fn test_all_steps_share_one_workspace() {
    let yaml = r#"
name: Build
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: make
      - run: make check
"#;

    let result = run_push(yaml, MockProvider::new()).await;

    let workspaces: Vec<PathBuf> = result
        .provider
        .commands()
        .into_iter()
        .map(|c| c.workspace)
        .collect();
    assert_eq!(workspaces.len(), 2);
    assert_eq!(workspaces[0], workspaces[1]);
    assert_eq!(result.provider.active(), 0, "environment should be torn down");
}

#[tokio::test]
async fn test_env_layers_and_expressions() {
    let yaml = r#"
name: Release
on: push
env:
  PROFILE: release
  TARGET: x86_64
jobs:
  package:
    runs-on: ubuntu-latest
    env:
      TARGET: aarch64
    steps:
      - name: Build
        run: cargo build --profile ${{ env.PROFILE }} --target ${{ env.TARGET }}
        env:
          RUSTFLAGS: -D warnings
      - name: Archive
        run: tar czf ${{ job.id }}-${{ event.branch }}.tgz target
        working-directory: dist
"#;

    let result = run_push(yaml, MockProvider::new()).await;
    assert_job_succeeded(&result, "package");

    let commands = result.provider.commands();
    assert_eq!(
        commands[0].script,
        "cargo build --profile release --target aarch64"
    );
    assert_eq!(commands[0].env["RUSTFLAGS"], "-D warnings");
    assert_eq!(commands[0].env["PROFILE"], "release");
    assert_eq!(commands[0].env["CI"], "true");

    // Step env does not leak into the next step
    assert!(!commands[1].env.contains_key("RUSTFLAGS"));
    assert_eq!(commands[1].script, "tar czf package-main.tgz target");
    assert_eq!(commands[1].working_dir, Some(PathBuf::from("dist")));
}

#[tokio::test]
async fn test_checkout_action_runs_as_a_step() {
    let yaml = r#"
name: Build
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
        with:
          ref: v1.2.0
      - run: cargo build
"#;

    let result = run_push(yaml, MockProvider::new()).await;
    assert_job_succeeded(&result, "build");

    let commands = result.provider.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].script.contains("git clone"));
    assert_eq!(commands[0].env["INPUT_REF"], "v1.2.0");
    assert_eq!(commands[1].script, "cargo build");
}

#[tokio::test]
async fn test_step_events_follow_execution() {
    let yaml = r#"
name: Build
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: echo one
      - run: echo two
"#;

    let result = run_push(yaml, MockProvider::new()).await;

    let logs: Vec<(usize, String)> = result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::StepLog { step, line, .. } => Some((*step, line.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        logs,
        vec![
            (0, "ran: echo one".to_string()),
            (1, "ran: echo two".to_string())
        ]
    );

    assert!(matches!(
        result.events.first(),
        Some(ExecutionEvent::RunStarted { jobs: 1, .. })
    ));
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::RunFinished { .. })
    ));
}
