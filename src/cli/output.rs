//! CLI output formatting

use crate::{
    core::{JobState, RunStatus, StepOutcome},
    execution::{ExecutionEvent, JobReport},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the jobs of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a job state for display
pub fn format_job_state(state: &JobState) -> String {
    match state {
        JobState::Pending => style("PENDING").dim().to_string(),
        JobState::Running { .. } => style("RUNNING").yellow().to_string(),
        JobState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        JobState::Failed { .. } => style("FAILED").red().to_string(),
        JobState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Format a stored run for a history listing
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };
    let event = match &summary.branch {
        Some(branch) => format!("{} ({})", summary.event, branch),
        None => summary.event.clone(),
    };

    format!(
        "{} {} - {} - {} - {} - {} ok, {} failed, {} skipped",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        style(event).cyan(),
        format_status(summary.status),
        summary.count("succeeded"),
        summary.count("failed"),
        summary.count("skipped"),
    )
}

/// Format the final line for one job
pub fn format_job_report(report: &JobReport) -> String {
    match &report.state {
        JobState::Succeeded { started_at, finished_at } => {
            let elapsed = finished_at
                .signed_duration_since(*started_at)
                .to_std()
                .unwrap_or_default();
            format!(
                "{} {} {}",
                CHECK,
                style(&report.name).green(),
                style(format_duration(elapsed)).dim()
            )
        }
        JobState::Failed { error, .. } => {
            format!("{} {}: {}", CROSS, style(&report.name).red(), style(error).dim())
        }
        JobState::Skipped { reason } => {
            format!("{} {}: {}", SKIP, style(&report.name).dim(), style(reason).dim())
        }
        state => format!("{} {} {}", INFO, report.name, format_job_state(state)),
    }
}

/// Format an execution event for display
///
/// Returns `None` for events that are not shown as a line (log output is
/// printed by the terminal streamer).
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow,
            event,
            jobs,
        } => Some(format!(
            "{} Running {} for {} - {} jobs ({})",
            ROCKET,
            style(workflow).bold(),
            style(event).cyan(),
            jobs,
            style(short_id(run_id)).dim()
        )),
        ExecutionEvent::JobStarted { name, .. } => {
            Some(format!("{} {}", SPINNER, style(name).cyan()))
        }
        ExecutionEvent::StepStarted { .. } | ExecutionEvent::StepLog { .. } => None,
        ExecutionEvent::StepFinished { job, result } => match result.outcome {
            StepOutcome::Succeeded => Some(format!(
                "   {} {} {}",
                style(format!("[{}]", job)).dim(),
                style(&result.name).green(),
                style(format_duration(Duration::from_millis(result.duration_ms))).dim()
            )),
            StepOutcome::Failed => Some(format!(
                "   {} {}: {}",
                style(format!("[{}]", job)).dim(),
                style(&result.name).red(),
                result.error.as_deref().unwrap_or("failed")
            )),
            StepOutcome::NotRun => None,
        },
        ExecutionEvent::JobFinished { report } => Some(format_job_report(report)),
        ExecutionEvent::JobSkipped { job, reason } => Some(format!(
            "{} {} skipped: {}",
            WARN,
            style(job).yellow(),
            style(reason).dim()
        )),
        ExecutionEvent::RunFinished { .. } => None,
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
