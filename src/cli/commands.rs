//! CLI command definitions

use crate::core::TriggerEvent;
use crate::execution::SchedulingStrategy;
use clap::Args;
use std::path::PathBuf;

/// Which event to simulate
#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Triggering event name
    #[arg(short, long, default_value = "push")]
    pub event: String,

    /// Branch of the event (defaults to the source checkout's current branch)
    #[arg(short, long)]
    pub branch: Option<String>,
}

impl EventArgs {
    pub fn to_event(&self, detected_branch: Option<String>) -> TriggerEvent {
        TriggerEvent::new(&self.event, self.branch.clone().or(detected_branch))
    }
}

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub trigger: EventArgs,

    /// Repository that `actions/checkout` clones from
    #[arg(long, default_value = ".")]
    pub source: PathBuf,

    /// Only run these jobs (and the jobs they need)
    #[arg(short, long = "job")]
    pub jobs: Vec<String>,

    /// Workflow env overrides (key=value)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrent jobs for the parallel-limited strategy
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Leave job workspaces on disk
    #[arg(long)]
    pub keep_workspaces: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    pub fn strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(self.max_parallel.max(1))
            }
        }
    }
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show which jobs an event would run, in order
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub trigger: EventArgs,

    /// Checkout whose current branch is used when `--branch` is not given
    #[arg(long, default_value = ".")]
    pub source: PathBuf,

    /// Only plan these jobs (and the jobs they need)
    #[arg(short, long = "job")]
    pub jobs: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show per-job details
    #[arg(long)]
    pub details: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
