//! Runner configuration

use crate::core::Shell;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a configured action is run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionHandlerConfig {
    /// Script run with the default shell
    Script(String),
    /// Script with an explicit shell
    Detailed {
        run: String,
        #[serde(default)]
        shell: Option<String>,
    },
}

/// Configuration for the local runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// `runs-on` labels this host accepts; empty accepts every label
    pub labels: Vec<String>,

    /// Shell for `run:` steps without `shell:`
    pub default_shell: Option<String>,

    /// Parent directory for job workspaces (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,

    /// Leave job workspaces on disk after the job finishes
    pub keep_workspaces: bool,

    /// Timeout for a step without `timeout-minutes`, in seconds
    pub step_timeout_secs: u64,

    /// Captured output per stream and step, in bytes
    pub max_output_bytes: usize,

    /// Treat actions without a handler as successful no-ops
    pub allow_unknown_actions: bool,

    /// Action name to handler
    pub actions: BTreeMap<String, ActionHandlerConfig>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            default_shell: None,
            workspace_root: None,
            keep_workspaces: false,
            step_timeout_secs: 3600,
            max_output_bytes: 1024 * 1024,
            allow_unknown_actions: false,
            actions: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load runner configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runner config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse runner configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RunnerConfig = serde_yaml::from_str(yaml).context("Invalid runner config")?;
        if config.step_timeout_secs == 0 {
            anyhow::bail!("step_timeout_secs must be greater than zero");
        }
        Ok(config)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = Some(root);
        self
    }

    pub fn with_keep_workspaces(mut self, keep: bool) -> Self {
        self.keep_workspaces = keep;
        self
    }

    pub fn with_step_timeout(mut self, timeout_secs: u64) -> Self {
        self.step_timeout_secs = timeout_secs;
        self
    }

    pub fn default_shell(&self) -> Shell {
        self.default_shell
            .as_deref()
            .map(Shell::parse)
            .unwrap_or_default()
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Check whether this runner accepts a job's `runs-on`
    pub fn accepts(&self, runs_on: &[String]) -> bool {
        self.labels.is_empty() || runs_on.iter().any(|label| self.labels.contains(label))
    }
}
