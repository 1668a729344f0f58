//! Main execution engine - orchestrates the entire workflow run

use crate::{
    core::{JobState, RunContext, RunStatus, StepResult, TriggerEvent, WorkflowRun},
    environment::EnvironmentProvider,
    execution::{
        EventEmitter, EventHandler, ExecutionEvent, ExecutionScheduler, JobExecutor, JobReport,
        SchedulingStrategy,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub event: TriggerEvent,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Selected jobs in plan order
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn from_run(run: &WorkflowRun) -> Self {
        Self {
            run_id: run.state.run_id,
            workflow_name: run.workflow_name.clone(),
            event: run.event.clone(),
            status: run.state.status,
            started_at: run.state.started_at,
            finished_at: run.state.finished_at,
            jobs: run
                .jobs
                .iter()
                .map(|planned| JobReport {
                    job_id: planned.job.id.clone(),
                    name: planned.job.name.clone(),
                    state: planned.state.clone(),
                    steps: planned.steps.clone(),
                })
                .collect(),
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.job_id == id)
    }

    pub fn is_success(&self) -> bool {
        self.status != RunStatus::Failed
    }
}

/// Main workflow execution engine
pub struct WorkflowEngine<P> {
    executor: Arc<JobExecutor<P>>,
    scheduler: ExecutionScheduler,
    event_handlers: Vec<EventHandler>,
}

impl<P: EnvironmentProvider + 'static> WorkflowEngine<P> {
    pub fn new(executor: JobExecutor<P>, strategy: SchedulingStrategy) -> Self {
        Self {
            executor: Arc::new(executor),
            scheduler: ExecutionScheduler::new(strategy),
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn executor(&self) -> &JobExecutor<P> {
        &self.executor
    }

    /// Execute every job of a planned run
    ///
    /// Independent jobs run as separate tasks; a failure only affects jobs
    /// that need the failed one, which are skipped.
    pub async fn execute(&self, run: &mut WorkflowRun, context: RunContext) -> RunReport {
        let events = EventEmitter::new(self.event_handlers.clone());
        let run_id = run.state.run_id;

        run.state.start(run.jobs.len());
        events.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow: run.workflow_name.clone(),
            event: run.event.clone(),
            jobs: run.jobs.len(),
        });

        if run.jobs.is_empty() {
            info!(
                "Workflow {} is not triggered by {}, nothing to run",
                run.workflow_name, run.event
            );
        } else {
            info!(
                "Starting workflow {} for {} ({} jobs, {})",
                run.workflow_name,
                run.event,
                run.jobs.len(),
                run_id
            );
            self.drive(run, Arc::new(context), &events).await;
        }

        let status = run.outcome();
        run.update_counts();
        run.state.finish(status);

        info!(
            "Workflow {} finished: {} ({} succeeded, {} failed, {} skipped)",
            run.workflow_name,
            status.as_str(),
            run.state.succeeded_jobs,
            run.state.failed_jobs,
            run.state.skipped_jobs
        );
        events.emit(ExecutionEvent::RunFinished { run_id, status });

        RunReport::from_run(run)
    }

    async fn drive(&self, run: &mut WorkflowRun, context: Arc<RunContext>, events: &EventEmitter) {
        let mut tasks: JoinSet<(String, Result<JobReport, JoinError>)> = JoinSet::new();

        loop {
            self.skip_blocked(run, events);

            for job_id in self.scheduler.next_jobs(run) {
                let Some(planned) = run.job_mut(&job_id) else {
                    continue;
                };
                planned.state = JobState::Running {
                    started_at: Utc::now(),
                };

                let job = planned.job.clone();
                let executor = self.executor.clone();
                let context = context.clone();
                let events = events.clone();

                // The inner task contains a panicking job, so the outer one
                // always reports which job it ran
                tasks.spawn(async move {
                    let handle =
                        tokio::spawn(async move { executor.execute(&job, &context, &events).await });
                    (job_id, handle.await)
                });
            }
            run.update_counts();

            match tasks.join_next().await {
                Some(Ok((job_id, Ok(report)))) => Self::record(run, &job_id, report),
                Some(Ok((job_id, Err(e)))) => {
                    error!("Job {} panicked: {}", job_id, e);
                    let Some(planned) = run.job_mut(&job_id) else {
                        continue;
                    };
                    let started_at = match planned.state {
                        JobState::Running { started_at } => started_at,
                        _ => Utc::now(),
                    };
                    planned.state = JobState::Failed {
                        error: format!("job task panicked: {}", e),
                        failed_step: None,
                        started_at,
                        finished_at: Utc::now(),
                    };
                    planned.steps = planned
                        .job
                        .steps
                        .iter()
                        .map(|s| StepResult::not_run(s.index, &s.name))
                        .collect();
                    let report = JobReport {
                        job_id: planned.job.id.clone(),
                        name: planned.job.name.clone(),
                        state: planned.state.clone(),
                        steps: planned.steps.clone(),
                    };
                    events.emit(ExecutionEvent::JobFinished { report });
                }
                Some(Err(e)) => error!("Job supervisor task failed: {}", e),
                None => break,
            }
        }

        if !run.is_complete() {
            // Only reachable when a job's needs are outside the run
            for planned in run.jobs.iter_mut().filter(|j| !j.state.is_terminal()) {
                let reason = "dependencies can never be satisfied".to_string();
                error!("Job {} {}", planned.job.id, reason);
                events.emit(ExecutionEvent::JobSkipped {
                    job: planned.job.id.clone(),
                    reason: reason.clone(),
                });
                planned.state = JobState::Skipped { reason };
            }
        }
    }

    /// Mark jobs whose needs did not succeed as skipped, transitively
    fn skip_blocked(&self, run: &mut WorkflowRun, events: &EventEmitter) {
        loop {
            let blocked = run.blocked_jobs();
            if blocked.is_empty() {
                return;
            }

            for (job_id, need) in blocked {
                let reason = format!("needs '{}' did not succeed", need);
                warn!("Skipping job {}: {}", job_id, reason);
                if let Some(planned) = run.job_mut(&job_id) {
                    planned.steps = planned
                        .job
                        .steps
                        .iter()
                        .map(|s| StepResult::not_run(s.index, &s.name))
                        .collect();
                    planned.state = JobState::Skipped {
                        reason: reason.clone(),
                    };
                }
                events.emit(ExecutionEvent::JobSkipped {
                    job: job_id,
                    reason,
                });
            }
        }
    }

    fn record(run: &mut WorkflowRun, job_id: &str, report: JobReport) {
        match run.job_mut(job_id) {
            Some(planned) => {
                planned.state = report.state;
                planned.steps = report.steps;
            }
            None => warn!("Finished job {} is not part of the run", job_id),
        }
    }
}
