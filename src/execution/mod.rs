//! Workflow execution engine

pub mod engine;
pub mod events;
pub mod executor;
pub mod scheduler;

pub use engine::{RunReport, WorkflowEngine};
pub use events::{EventEmitter, EventHandler, ExecutionEvent, StepLogSink};
pub use executor::{JobExecutor, JobReport, StepError};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
