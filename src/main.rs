use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use workflow_runner::{
    actions::ActionRegistry,
    cli::{
        commands::{HistoryCommand, PlanCommand, RunCommand, ValidateCommand},
        output::*,
        terminal_output::TerminalOutput,
        Cli, Command,
    },
    core::{config::WorkflowConfig, RunContext, RunStatus},
    environment::{LocalProvider, RunnerConfig},
    execution::{ExecutionEvent, JobExecutor, WorkflowEngine},
    persistence::{create_summary, PersistenceBackend, RunSummary},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    init_logging(cli.verbose)?;

    let success = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, &cli).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Plan(cmd) => plan_workflow(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))
}

fn load_runner_config(cli: &Cli) -> Result<RunnerConfig> {
    match &cli.config {
        Some(path) => RunnerConfig::from_file(path),
        None => Ok(RunnerConfig::default()),
    }
}

/// Current branch of a git checkout, if it is on one
async fn detect_branch(source: &Path) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(source)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!("{} is not a git checkout", source.display());
        return None;
    }

    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty() && branch != "HEAD").then_some(branch)
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    Ok(Box::new(
        workflow_runner::persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Box<dyn PersistenceBackend>> {
    tracing::warn!("Built without the sqlite feature; history is kept for this process only");
    Ok(Box::new(workflow_runner::persistence::InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, cli: &Cli) -> Result<bool> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow")?;
    let mut runner = load_runner_config(cli)?;
    if cmd.keep_workspaces {
        runner = runner.with_keep_workspaces(true);
    }

    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    let overrides: HashMap<String, String> = cmd.env.iter().cloned().collect();
    for (key, value) in &cmd.env {
        println!(
            "{} Env override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    let env = config.env_with_overrides(&overrides);
    let workflow = config.to_workflow();

    let source = cmd
        .source
        .canonicalize()
        .with_context(|| format!("Source directory {} not found", cmd.source.display()))?;
    let event = cmd.trigger.to_event(detect_branch(&source).await);
    let mut run = workflow.plan(&event, &cmd.jobs)?;
    let context = RunContext::for_run(&run, env, source);

    let executor = JobExecutor::new(LocalProvider::new(runner.clone()))
        .with_actions(ActionRegistry::from_config(&runner))
        .with_default_shell(runner.default_shell())
        .with_step_timeout(runner.step_timeout());
    let mut engine = WorkflowEngine::new(executor, cmd.strategy());

    let progress = create_progress_bar(run.jobs.len());
    let printer = progress.clone();
    engine.add_event_handler(move |event| {
        if let Some(line) = format_execution_event(&event) {
            printer.println(line);
        }
        if matches!(
            event,
            ExecutionEvent::JobFinished { .. } | ExecutionEvent::JobSkipped { .. }
        ) {
            printer.inc(1);
        }
    });
    if cli.stream {
        let output = TerminalOutput::new(Some(progress.clone()));
        engine.add_event_handler(move |event| output.on_event(&event));
    }

    println!();
    let report = engine.execute(&mut run, context).await;
    progress.finish_and_clear();

    if !cmd.no_history {
        let store = open_store().await?;
        let summary = create_summary(&report);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(summary.run_id).dim()
        );
    }

    match report.status {
        RunStatus::Succeeded => println!(
            "\n{} {} {}",
            CHECK,
            style(&report.workflow_name).bold(),
            style("succeeded").green()
        ),
        RunStatus::Skipped => println!(
            "\n{} {} is not triggered by {}",
            SKIP,
            style(&report.workflow_name).bold(),
            style(&report.event).cyan()
        ),
        _ => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&report.workflow_name).bold(),
                style("failed").red()
            );
            for job in report.jobs.iter().filter(|j| !j.is_success()) {
                println!("  {}", format_job_report(job));
            }
        }
    }

    Ok(report.is_success())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            let workflow = config.to_workflow();
            let events: Vec<&str> = workflow.triggers.event_names().collect();

            println!("{} Workflow is valid!", CHECK);
            println!("  Name: {}", style(&workflow.name).bold());
            println!("  Triggers: {}", style(events.join(", ")).cyan());
            println!("  Jobs: {}", style(workflow.jobs.len()).cyan());
            println!(
                "  Order: {}",
                style(workflow.execution_order().join(" → ")).dim()
            );

            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(false)
        }
    }
}

async fn plan_workflow(cmd: &PlanCommand) -> Result<bool> {
    let workflow = WorkflowConfig::from_file(&cmd.file)
        .context("Failed to load workflow")?
        .to_workflow();
    let event = cmd.trigger.to_event(detect_branch(&cmd.source).await);
    let run = workflow.plan(&event, &cmd.jobs)?;

    if cmd.json {
        let jobs: Vec<serde_json::Value> = run
            .jobs
            .iter()
            .map(|planned| {
                serde_json::json!({
                    "id": planned.job.id,
                    "name": planned.job.name,
                    "runs_on": planned.job.runs_on,
                    "needs": planned.job.needs,
                    "steps": planned.job.steps.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let data = serde_json::json!({
            "workflow": run.workflow_name,
            "event": run.event,
            "triggered": !run.jobs.is_empty(),
            "jobs": jobs,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    if run.jobs.is_empty() {
        println!(
            "{} {} is not triggered by {}",
            SKIP,
            style(&run.workflow_name).bold(),
            style(&run.event).cyan()
        );
        return Ok(true);
    }

    println!(
        "{} {} for {}:",
        INFO,
        style(&run.workflow_name).bold(),
        style(&run.event).cyan()
    );
    for (position, planned) in run.jobs.iter().enumerate() {
        let job = &planned.job;
        let needs = if job.needs.is_empty() {
            String::new()
        } else {
            format!(" (needs {})", job.needs.join(", "))
        };
        println!(
            "  {}. {} [{}]{}",
            position + 1,
            style(&job.name).bold(),
            style(job.runs_on_label()).dim(),
            style(needs).dim()
        );
        for step in &job.steps {
            println!("       - {}", step.name);
        }
    }
    Ok(true)
}

async fn show_history(cmd: &HistoryCommand) -> Result<bool> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(true);
    }

    let mut runs = match &cmd.workflow {
        Some(name) => store.list_runs(name).await?,
        None => {
            let mut all = Vec::new();
            for name in store.list_workflows().await? {
                all.extend(store.list_runs(&name).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(true);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    println!("{} Run history (latest {}):", INFO, runs.len());
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
        if cmd.details {
            for job in &summary.jobs {
                print_job_line(job);
            }
        }
    }
    Ok(true)
}

fn print_job_line(job: &workflow_runner::persistence::JobSummary) {
    match (&job.failed_step, &job.error) {
        (Some(step), _) => println!(
            "      {} {} at '{}'",
            style(&job.job_id).bold(),
            style(&job.status).red(),
            step
        ),
        (None, Some(error)) => println!(
            "      {} {}: {}",
            style(&job.job_id).bold(),
            style(&job.status).yellow(),
            style(error).dim()
        ),
        (None, None) => println!("      {} {}", style(&job.job_id).bold(), job.status),
    }
}

fn print_run_details(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!(
        "  Event: {}{}",
        summary.event,
        summary
            .branch
            .as_ref()
            .map(|b| format!(" ({})", b))
            .unwrap_or_default()
    );
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(finished) = summary.finished_at {
        println!("  Finished: {}", style(finished.to_rfc3339()).dim());
        if let Ok(duration) = finished.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Jobs:");
    for job in &summary.jobs {
        print_job_line(job);
    }
    Ok(())
}
