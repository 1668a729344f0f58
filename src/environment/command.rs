//! Command specs, outputs and errors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error types for environment operations
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("no runner accepts runs-on [{labels}] for job '{job}'")]
    UnsupportedLabels { job: String, labels: String },

    #[error("failed to provision workspace: {0}")]
    Provision(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("working directory does not exist: {0}")]
    MissingWorkingDirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command to execute in an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,

    /// Added on top of the environment's inherited variables
    pub env: BTreeMap<String, String>,

    /// Relative to the workspace; `None` is the workspace itself
    pub working_dir: Option<PathBuf>,

    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
            working_dir: None,
            timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The last argument, which for shell invocations is the script
    pub fn script(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Which pipe a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of a finished command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// `None` when terminated by a signal
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    /// Output beyond the capture limit was dropped
    pub truncated: bool,

    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Shorthand for scripted environments
    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration: Duration::ZERO,
        }
    }

    /// Last non-empty stderr line, for error messages
    pub fn last_error_line(&self) -> Option<&str> {
        self.stderr.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Accumulates output lines up to a byte limit
#[derive(Debug, Default)]
pub(crate) struct CapturedOutput {
    buffer: String,
    limit: usize,
    pub truncated: bool,
}

impl CapturedOutput {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        if self.buffer.len() + line.len() + 1 > self.limit {
            self.truncated = true;
            return;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}
