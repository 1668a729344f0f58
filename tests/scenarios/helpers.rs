//! Test helpers for workflow scenarios
//!
//! `MockProvider` hands out environments that record every command instead
//! of running it. Exit codes are scripted by substring so a scenario can
//! make any step fail.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workflow_runner::core::config::WorkflowConfig;
use workflow_runner::environment::{
    CommandOutput, CommandSpec, Environment, EnvironmentError, EnvironmentProvider, LogSink,
    OutputStream,
};
use workflow_runner::{
    ExecutionEvent, Job, JobExecutor, JobState, RunContext, RunReport, SchedulingStrategy,
    TriggerEvent, WorkflowEngine,
};

/// A command as one environment saw it
#[derive(Debug, Clone)]
pub struct ExecutedCommand {
    pub job: String,
    pub script: String,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub workspace: PathBuf,
}

#[derive(Debug, Default)]
struct MockState {
    commands: Mutex<Vec<ExecutedCommand>>,
    provisioned: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Provider whose environments only record commands
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<MockState>,
    failures: Vec<(String, i32)>,
    rejected_labels: Vec<String>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts containing `pattern` exit with `exit_code`
    pub fn fail_when(mut self, pattern: &str, exit_code: i32) -> Self {
        self.failures.push((pattern.to_string(), exit_code));
        self
    }

    /// Refuse to provision jobs that run on `label`
    pub fn reject_label(mut self, label: &str) -> Self {
        self.rejected_labels.push(label.to_string());
        self
    }

    /// Every command takes this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn commands(&self) -> Vec<ExecutedCommand> {
        self.state.commands.lock().unwrap().clone()
    }

    /// Most environments alive at the same time
    pub fn max_concurrent(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    /// Environments still alive; zero once every job tore down
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentProvider for MockProvider {
    async fn provision(&self, job: &Job) -> Result<Box<dyn Environment>, EnvironmentError> {
        if job.runs_on.iter().any(|l| self.rejected_labels.contains(l)) {
            return Err(EnvironmentError::UnsupportedLabels {
                job: job.id.clone(),
                labels: job.runs_on.join(", "),
            });
        }

        let number = self.state.provisioned.fetch_add(1, Ordering::SeqCst);
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MockEnvironment {
            job: job.id.clone(),
            workspace: PathBuf::from(format!("/mock/{}-{}", job.id, number)),
            provider: self.clone(),
        }))
    }
}

pub struct MockEnvironment {
    job: String,
    workspace: PathBuf,
    provider: MockProvider,
}

#[async_trait]
impl Environment for MockEnvironment {
    fn workspace(&self) -> &Path {
        &self.workspace
    }

    async fn run(
        &self,
        command: &CommandSpec,
        sink: &dyn LogSink,
    ) -> Result<CommandOutput, EnvironmentError> {
        let script = command.script().unwrap_or_default().to_string();
        self.provider
            .state
            .commands
            .lock()
            .unwrap()
            .push(ExecutedCommand {
                job: self.job.clone(),
                script: script.clone(),
                env: command.env.clone(),
                working_dir: command.working_dir.clone(),
                workspace: self.workspace.clone(),
            });

        if let Some(delay) = self.provider.delay {
            tokio::time::sleep(delay).await;
        }
        sink.on_line(OutputStream::Stdout, &format!("ran: {}", script));

        let exit_code = self
            .provider
            .failures
            .iter()
            .find(|(pattern, _)| script.contains(pattern.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(CommandOutput::with_exit_code(exit_code))
    }

    async fn teardown(&self) -> Result<(), EnvironmentError> {
        self.provider.state.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything a scenario run produced
pub struct ScenarioResult {
    pub report: RunReport,
    pub events: Vec<ExecutionEvent>,
    pub provider: MockProvider,
}

impl ScenarioResult {
    /// Scripts one job ran, in order
    pub fn scripts(&self, job: &str) -> Vec<String> {
        self.provider
            .commands()
            .into_iter()
            .filter(|c| c.job == job)
            .map(|c| c.script)
            .collect()
    }

    /// Jobs in the order they ran their first command
    pub fn job_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for command in self.provider.commands() {
            if !order.contains(&command.job) {
                order.push(command.job);
            }
        }
        order
    }

    pub fn state(&self, job: &str) -> &JobState {
        &self
            .report
            .job(job)
            .unwrap_or_else(|| panic!("job '{}' not in report", job))
            .state
    }
}

/// Plan `yaml` for `event` and run it on `provider`
pub async fn run_scenario(
    yaml: &str,
    event: TriggerEvent,
    provider: MockProvider,
    strategy: SchedulingStrategy,
) -> ScenarioResult {
    let config = WorkflowConfig::from_yaml(yaml).expect("workflow should parse");
    let env = config.env_with_overrides(&Default::default());
    let mut run = config
        .to_workflow()
        .plan(&event, &[])
        .expect("plan should succeed");
    let context = RunContext::for_run(&run, env, PathBuf::from("/src"));

    let mut engine = WorkflowEngine::new(JobExecutor::new(provider.clone()), strategy);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let report = engine.execute(&mut run, context).await;
    let events = events.lock().unwrap().clone();

    ScenarioResult {
        report,
        events,
        provider,
    }
}

/// Run on a push to `main` with the default strategy
pub async fn run_push(yaml: &str, provider: MockProvider) -> ScenarioResult {
    run_scenario(
        yaml,
        TriggerEvent::push("main"),
        provider,
        SchedulingStrategy::default(),
    )
    .await
}

pub fn assert_job_succeeded(result: &ScenarioResult, job: &str) {
    assert!(
        matches!(result.state(job), JobState::Succeeded { .. }),
        "job '{}' should have succeeded, got {:?}",
        job,
        result.state(job)
    );
}

/// Assert `job` failed at step `step` (zero-based)
pub fn assert_job_failed_at(result: &ScenarioResult, job: &str, step: usize) {
    match result.state(job) {
        JobState::Failed { failed_step, .. } => assert_eq!(
            *failed_step,
            Some(step),
            "job '{}' failed at the wrong step",
            job
        ),
        other => panic!("job '{}' should have failed, got {:?}", job, other),
    }
}

pub fn assert_job_skipped(result: &ScenarioResult, job: &str) {
    assert!(
        matches!(result.state(job), JobState::Skipped { .. }),
        "job '{}' should have been skipped, got {:?}",
        job,
        result.state(job)
    );
}

/// Assert every command of `first` ran before any command of `second`
pub fn assert_ran_before(result: &ScenarioResult, first: &str, second: &str) {
    let commands = result.provider.commands();
    let last_first = commands.iter().rposition(|c| c.job == first);
    let first_second = commands.iter().position(|c| c.job == second);
    match (last_first, first_second) {
        (Some(a), Some(b)) => assert!(a < b, "'{}' should finish before '{}' starts", first, second),
        _ => panic!("both '{}' and '{}' should have run", first, second),
    }
}
