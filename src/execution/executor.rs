//! Job executor - runs one job's steps in its own environment

use crate::{
    actions::{ActionError, ActionRegistry, Resolution},
    core::{Job, JobContext, JobState, RunContext, Shell, Step, StepKind, StepOutcome, StepResult},
    environment::{CommandSpec, Environment, EnvironmentError, EnvironmentProvider},
    execution::{EventEmitter, ExecutionEvent, StepLogSink},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a step failed
#[derive(Debug, Error)]
pub enum StepError {
    #[error(
        "exit code {code}{}",
        .stderr.as_deref().map(|line| format!(": {}", line)).unwrap_or_default()
    )]
    ExitCode { code: i32, stderr: Option<String> },

    #[error("terminated by signal")]
    Signal,

    #[error("job timeout exceeded")]
    JobTimeout,

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Outcome of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub name: String,
    /// Terminal state: succeeded, failed or skipped
    pub state: JobState,
    /// One entry per step, in declaration order
    pub steps: Vec<StepResult>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error, .. } => Some(error),
            JobState::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.outcome == StepOutcome::Failed)
    }

    /// Report for a job that never started
    pub fn skipped(job: &Job, reason: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            name: job.name.clone(),
            state: JobState::Skipped {
                reason: reason.into(),
            },
            steps: not_run(&job.steps),
        }
    }
}

fn not_run(steps: &[Step]) -> Vec<StepResult> {
    steps
        .iter()
        .map(|s| StepResult::not_run(s.index, &s.name))
        .collect()
}

/// A step ready to run, or an action resolved to nothing
enum Prepared {
    Command(CommandSpec),
    Skip(String),
}

/// Executes jobs, one environment per job
pub struct JobExecutor<P> {
    provider: Arc<P>,
    actions: ActionRegistry,
    default_shell: Shell,
    step_timeout: Duration,
}

impl<P: EnvironmentProvider> JobExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            actions: ActionRegistry::with_builtins(),
            default_shell: Shell::default(),
            step_timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_default_shell(mut self, shell: Shell) -> Self {
        self.default_shell = shell;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run every step of `job` in a fresh environment
    ///
    /// Steps run in declaration order. The first failing step ends the job;
    /// the remaining steps are reported as not run. The environment is torn
    /// down whatever the outcome.
    pub async fn execute(&self, job: &Job, run: &RunContext, events: &EventEmitter) -> JobReport {
        let started_at = Utc::now();
        info!("Starting job {} ({} steps)", job.id, job.steps.len());
        events.emit(ExecutionEvent::JobStarted {
            job: job.id.clone(),
            name: job.name.clone(),
        });

        let environment = match self.provider.provision(job).await {
            Ok(environment) => environment,
            Err(e) => {
                error!("Failed to provision environment for job {}: {}", job.id, e);
                let report = JobReport {
                    job_id: job.id.clone(),
                    name: job.name.clone(),
                    state: JobState::Failed {
                        error: e.to_string(),
                        failed_step: None,
                        started_at,
                        finished_at: Utc::now(),
                    },
                    steps: not_run(&job.steps),
                };
                events.emit(ExecutionEvent::JobFinished {
                    report: report.clone(),
                });
                return report;
            }
        };

        let context = JobContext::new(run, job, environment.workspace());
        let deadline = job.timeout.and_then(|t| Instant::now().checked_add(t));

        let mut steps = Vec::with_capacity(job.steps.len());
        let mut failure: Option<(usize, String)> = None;

        for step in &job.steps {
            if failure.is_some() {
                steps.push(StepResult::not_run(step.index, &step.name));
                continue;
            }

            let result = self
                .execute_step(job, step, &context, environment.as_ref(), deadline, events)
                .await;
            if result.outcome == StepOutcome::Failed {
                failure = Some((
                    step.index,
                    format!(
                        "step '{}' failed: {}",
                        step.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    ),
                ));
            }
            steps.push(result);
        }

        if let Err(e) = environment.teardown().await {
            warn!("Failed to tear down environment for job {}: {}", job.id, e);
        }

        let finished_at = Utc::now();
        let state = match failure {
            Some((index, error)) => {
                warn!("Job {} failed: {}", job.id, error);
                JobState::Failed {
                    error,
                    failed_step: Some(index),
                    started_at,
                    finished_at,
                }
            }
            None => {
                info!("Job {} succeeded", job.id);
                JobState::Succeeded {
                    started_at,
                    finished_at,
                }
            }
        };

        let report = JobReport {
            job_id: job.id.clone(),
            name: job.name.clone(),
            state,
            steps,
        };
        events.emit(ExecutionEvent::JobFinished {
            report: report.clone(),
        });
        report
    }

    async fn execute_step(
        &self,
        job: &Job,
        step: &Step,
        context: &JobContext,
        environment: &dyn Environment,
        deadline: Option<Instant>,
        events: &EventEmitter,
    ) -> StepResult {
        info!("Job {}: step {} '{}'", job.id, step.index + 1, step.name);
        events.emit(ExecutionEvent::StepStarted {
            job: job.id.clone(),
            step: step.index,
            name: step.name.clone(),
        });

        let started = Instant::now();
        let outcome = self.run_step(job, step, context, environment, deadline, events).await;

        let result = StepResult {
            index: step.index,
            name: step.name.clone(),
            outcome: if outcome.is_ok() {
                StepOutcome::Succeeded
            } else {
                StepOutcome::Failed
            },
            exit_code: match &outcome {
                Ok(code) => *code,
                Err(StepError::ExitCode { code, .. }) => Some(*code),
                Err(_) => None,
            },
            error: outcome.as_ref().err().map(|e| e.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match &result.error {
            Some(error) => warn!("Job {}: step '{}' failed: {}", job.id, step.name, error),
            None => debug!("Job {}: step '{}' succeeded", job.id, step.name),
        }

        events.emit(ExecutionEvent::StepFinished {
            job: job.id.clone(),
            result: result.clone(),
        });
        result
    }

    /// Run a step; `Ok` carries the exit code when a command ran
    async fn run_step(
        &self,
        job: &Job,
        step: &Step,
        context: &JobContext,
        environment: &dyn Environment,
        deadline: Option<Instant>,
        events: &EventEmitter,
    ) -> Result<Option<i32>, StepError> {
        let mut command = match self.prepare(step, context)? {
            Prepared::Command(command) => command,
            Prepared::Skip(reason) => {
                info!("Job {}: step '{}' skipped: {}", job.id, step.name, reason);
                return Ok(None);
            }
        };

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StepError::JobTimeout);
            }
            command.timeout = command.timeout.min(remaining);
        }

        debug!("Job {}: running {} {:?}", job.id, command.program, command.args);
        let sink = StepLogSink::new(events, &job.id, step.index);
        let output = environment.run(&command, &sink).await?;

        match output.exit_code {
            Some(0) => Ok(Some(0)),
            Some(code) => Err(StepError::ExitCode {
                code,
                stderr: output.last_error_line().map(str::to_string),
            }),
            None => Err(StepError::Signal),
        }
    }

    /// Turn a step into a command for its environment
    fn prepare(&self, step: &Step, context: &JobContext) -> Result<Prepared, StepError> {
        let (script, shell, scoped) = match &step.kind {
            StepKind::Run { script, shell } => {
                let scoped = context.for_step(step, None);
                let shell = shell.clone().unwrap_or_else(|| self.default_shell.clone());
                (scoped.render(script), shell, scoped)
            }
            StepKind::Action { action, inputs } => {
                let scoped = context.for_step(step, Some(inputs));
                match self.actions.resolve(action, &scoped)? {
                    Resolution::Script { script, shell } => (script, shell, scoped),
                    Resolution::Skip { reason } => return Ok(Prepared::Skip(reason)),
                }
            }
        };

        let (program, args) = shell.invocation(&script);
        let working_dir = step
            .working_directory
            .as_deref()
            .map(|dir| PathBuf::from(scoped.render(dir)));

        Ok(Prepared::Command(
            CommandSpec::new(program, args)
                .with_env(scoped.env().clone())
                .with_working_dir(working_dir)
                .with_timeout(step.timeout.unwrap_or(self.step_timeout)),
        ))
    }
}
