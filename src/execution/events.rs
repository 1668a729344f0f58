//! Execution events and their delivery to handlers

use crate::core::{RunStatus, StepResult, TriggerEvent};
use crate::environment::{LogSink, OutputStream};
use crate::execution::JobReport;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a workflow run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
        event: TriggerEvent,
        jobs: usize,
    },
    JobStarted {
        job: String,
        name: String,
    },
    StepStarted {
        job: String,
        step: usize,
        name: String,
    },
    StepLog {
        job: String,
        step: usize,
        stream: OutputStream,
        line: String,
    },
    StepFinished {
        job: String,
        result: StepResult,
    },
    JobFinished {
        report: JobReport,
    },
    JobSkipped {
        job: String,
        reason: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fans events out to a fixed set of handlers
#[derive(Clone, Default)]
pub struct EventEmitter {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventEmitter {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Forwards a step's output lines as [`ExecutionEvent::StepLog`]
pub struct StepLogSink<'a> {
    emitter: &'a EventEmitter,
    job: &'a str,
    step: usize,
}

impl<'a> StepLogSink<'a> {
    pub fn new(emitter: &'a EventEmitter, job: &'a str, step: usize) -> Self {
        Self { emitter, job, step }
    }
}

impl LogSink for StepLogSink<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        self.emitter.emit(ExecutionEvent::StepLog {
            job: self.job.to_string(),
            step: self.step,
            stream,
            line: line.to_string(),
        });
    }
}
