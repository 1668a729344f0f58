//! Core domain models for workflows

pub mod config;
pub mod context;
pub mod job;
pub mod run;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::{JobContext, RunContext, StepContext};
pub use job::Job;
pub use run::{PlannedJob, WorkflowRun};
pub use state::{JobState, RunState, RunStatus, StepOutcome, StepResult};
pub use step::{Shell, Step, StepKind};
pub use trigger::{BranchFilter, TriggerEvent, Triggers};
pub use workflow::Workflow;
