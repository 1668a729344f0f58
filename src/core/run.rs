//! A single run of a workflow for one event

use crate::core::{
    job::Job,
    state::{JobState, RunState, RunStatus, StepResult},
    trigger::TriggerEvent,
};
use std::collections::HashSet;
use std::sync::Arc;

/// A job selected for a run, with its runtime state
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub job: Arc<Job>,
    pub state: JobState,
    pub steps: Vec<StepResult>,
}

/// The jobs an event selected, in execution order, plus their state
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub workflow_name: String,
    pub event: TriggerEvent,
    pub jobs: Vec<PlannedJob>,
    pub state: RunState,
}

impl WorkflowRun {
    pub fn new(workflow_name: &str, event: TriggerEvent, jobs: Vec<Job>) -> Self {
        Self {
            workflow_name: workflow_name.to_string(),
            event,
            jobs: jobs
                .into_iter()
                .map(|job| PlannedJob {
                    job: Arc::new(job),
                    state: JobState::Pending,
                    steps: Vec::new(),
                })
                .collect(),
            state: RunState::new(),
        }
    }

    /// Get a planned job by ID
    pub fn job(&self, id: &str) -> Option<&PlannedJob> {
        self.jobs.iter().find(|j| j.job.id == id)
    }

    /// Get a mutable planned job by ID
    pub fn job_mut(&mut self, id: &str) -> Option<&mut PlannedJob> {
        self.jobs.iter_mut().find(|j| j.job.id == id)
    }

    fn succeeded_ids(&self) -> HashSet<String> {
        self.jobs
            .iter()
            .filter(|j| j.state.is_success())
            .map(|j| j.job.id.clone())
            .collect()
    }

    /// Pending jobs whose needs all succeeded, in execution order
    pub fn ready_jobs(&self) -> Vec<&PlannedJob> {
        let succeeded = self.succeeded_ids();
        self.jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Pending) && j.job.dependencies_met(&succeeded))
            .collect()
    }

    /// Pending jobs that can never run, with the dependency to blame
    pub fn blocked_jobs(&self) -> Vec<(String, String)> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Pending))
            .filter_map(|j| {
                j.job
                    .needs
                    .iter()
                    .find(|need| {
                        self.job(need).is_some_and(|dep| {
                            matches!(dep.state, JobState::Failed { .. } | JobState::Skipped { .. })
                        })
                    })
                    .map(|need| (j.job.id.clone(), need.clone()))
            })
            .collect()
    }

    /// Get all currently running jobs
    pub fn running_jobs(&self) -> Vec<&PlannedJob> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Running { .. }))
            .collect()
    }

    /// Check if every job reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.jobs.iter().all(|j| j.state.is_terminal())
    }

    /// Final status derived from job states
    pub fn outcome(&self) -> RunStatus {
        if self.jobs.is_empty() {
            RunStatus::Skipped
        } else if self.jobs.iter().all(|j| j.state.is_success()) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }

    /// Recompute the job counters in the run state
    pub fn update_counts(&mut self) {
        let count = |f: fn(&JobState) -> bool| self.jobs.iter().filter(|j| f(&j.state)).count();
        let succeeded = count(|s| matches!(s, JobState::Succeeded { .. }));
        let failed = count(|s| matches!(s, JobState::Failed { .. }));
        let skipped = count(|s| matches!(s, JobState::Skipped { .. }));
        let running = count(|s| matches!(s, JobState::Running { .. }));

        self.state.total_jobs = self.jobs.len();
        self.state.succeeded_jobs = succeeded;
        self.state.failed_jobs = failed;
        self.state.skipped_jobs = skipped;
        self.state.running_jobs = running;
    }
}
