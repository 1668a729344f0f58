//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every selected job succeeded
    Succeeded,
    /// At least one job failed or was skipped because of a failure
    Failed,
    /// The event did not trigger the workflow
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Skipped => "Skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Running" => RunStatus::Running,
            "Succeeded" => RunStatus::Succeeded,
            "Failed" => RunStatus::Failed,
            "Skipped" => RunStatus::Skipped,
            _ => RunStatus::Pending,
        }
    }
}

/// State of a single job within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobState {
    /// Waiting for its dependencies or a scheduling slot
    Pending,
    /// Currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// All steps succeeded
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// A step failed or the environment could not be provisioned
    Failed {
        error: String,
        failed_step: Option<usize>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Never ran because a dependency did not succeed
    Skipped {
        reason: String,
    },
}

impl JobState {
    /// Check if job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::Skipped { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Succeeded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running { .. } => "running",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::Skipped { .. } => "skipped",
        }
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    /// An earlier step in the job failed
    NotRun,
}

/// Result of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub name: String,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn not_run(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            outcome: StepOutcome::NotRun,
            exit_code: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of selected jobs
    pub total_jobs: usize,

    pub succeeded_jobs: usize,

    pub failed_jobs: usize,

    pub skipped_jobs: usize,

    pub running_jobs: usize,
}

impl RunState {
    /// Create a new run state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            total_jobs: 0,
            succeeded_jobs: 0,
            failed_jobs: 0,
            skipped_jobs: 0,
            running_jobs: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_jobs: usize) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_jobs = total_jobs;
    }

    /// Mark run as finished with the given status
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
