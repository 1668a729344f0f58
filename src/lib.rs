//! workflow-runner - run CI workflow files locally, one isolated workspace per job

pub mod actions;
pub mod cli;
pub mod core;
pub mod environment;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use actions::{ActionHandler, ActionRef, ActionRegistry};
pub use core::{Job, JobState, RunContext, RunStatus, Step, StepOutcome, TriggerEvent, Workflow, WorkflowRun};
pub use environment::{Environment, EnvironmentProvider, LocalProvider, RunnerConfig};
pub use execution::{
    ExecutionEvent, JobExecutor, JobReport, RunReport, SchedulingStrategy, WorkflowEngine,
};
