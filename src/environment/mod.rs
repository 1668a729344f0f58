//! Execution environments for jobs
//!
//! Every job gets its own [`Environment`] from an [`EnvironmentProvider`].
//! Steps of that job run one after another on that single instance.

pub mod command;
pub mod config;
pub mod local;

use crate::core::Job;
use async_trait::async_trait;
use std::path::Path;

pub use command::{CommandOutput, CommandSpec, EnvironmentError, OutputStream};
pub use config::{ActionHandlerConfig, RunnerConfig};
pub use local::{LocalEnvironment, LocalProvider};

/// Receives output lines as a command produces them
pub trait LogSink: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Sink that drops everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// An isolated place to run one job's commands
#[async_trait]
pub trait Environment: Send + Sync {
    /// Root directory commands run in
    fn workspace(&self) -> &Path;

    /// Run a command to completion, streaming its output to `sink`
    async fn run(
        &self,
        command: &CommandSpec,
        sink: &dyn LogSink,
    ) -> Result<CommandOutput, EnvironmentError>;

    /// Release the environment; called once after the last step
    async fn teardown(&self) -> Result<(), EnvironmentError>;
}

/// Trait for environment provisioning - allows for different implementations
#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    /// Create a fresh environment for `job`
    async fn provision(&self, job: &Job) -> Result<Box<dyn Environment>, EnvironmentError>;
}
