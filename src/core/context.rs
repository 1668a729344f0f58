//! Run and job contexts - environment and expression variables

use crate::core::job::Job;
use crate::core::run::WorkflowRun;
use crate::core::step::Step;
use crate::core::trigger::TriggerEvent;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use uuid::Uuid;

/// Data shared by every job of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,

    pub workflow_name: String,

    /// The triggering event
    pub event: TriggerEvent,

    /// Workflow env with command-line overrides applied
    pub env: BTreeMap<String, String>,

    /// Directory jobs check out from
    pub source_dir: PathBuf,
}

impl RunContext {
    /// Context for a planned run, sharing its run id
    pub fn for_run(run: &WorkflowRun, env: BTreeMap<String, String>, source_dir: PathBuf) -> Self {
        Self {
            run_id: run.state.run_id,
            workflow_name: run.workflow_name.clone(),
            event: run.event.clone(),
            env,
            source_dir,
        }
    }
}

/// Execution context for one job on one environment
///
/// Holds the environment every step starts from and the variables
/// available to `${{ }}` expressions.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,

    /// Expression variables (`env.X`, `job.id`, ...)
    pub variables: HashMap<String, String>,

    /// Environment for every step of the job
    pub env: BTreeMap<String, String>,
}

impl JobContext {
    /// Build the context for `job` running in `workspace`
    pub fn new(run: &RunContext, job: &Job, workspace: &Path) -> Self {
        let workspace_str = workspace.display().to_string();
        let source_str = run.source_dir.display().to_string();

        let mut variables = HashMap::new();
        variables.insert("workflow.name".to_string(), run.workflow_name.clone());
        variables.insert("job.id".to_string(), job.id.clone());
        variables.insert("event.name".to_string(), run.event.name.clone());
        if let Some(branch) = &run.event.branch {
            variables.insert("event.branch".to_string(), branch.clone());
        }
        variables.insert("runner.workspace".to_string(), workspace_str.clone());
        variables.insert("runner.source".to_string(), source_str.clone());

        let mut env = BTreeMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.insert("PIPELINE_RUN_ID".to_string(), run.run_id.to_string());
        env.insert("PIPELINE_WORKFLOW".to_string(), run.workflow_name.clone());
        env.insert("PIPELINE_JOB".to_string(), job.id.clone());
        env.insert("PIPELINE_EVENT_NAME".to_string(), run.event.name.clone());
        if let Some(branch) = &run.event.branch {
            env.insert("PIPELINE_REF".to_string(), branch.clone());
        }
        env.insert("PIPELINE_WORKSPACE".to_string(), workspace_str);
        env.insert("PIPELINE_SOURCE".to_string(), source_str);

        let mut context = Self {
            job_id: job.id.clone(),
            variables,
            env,
        };
        context.extend_env(&run.env);
        context.extend_env(&job.env);
        context
    }

    /// Add env entries, rendering their values first
    fn extend_env(&mut self, entries: &BTreeMap<String, String>) {
        for (key, value) in entries {
            let rendered = self.render(value);
            self.variables.insert(format!("env.{}", key), rendered.clone());
            self.env.insert(key.clone(), rendered);
        }
    }

    /// Substitute `${{ path }}` placeholders
    pub fn render(&self, template: &str) -> String {
        render_expressions(template, &self.variables)
    }

    /// Context for one step: step env and action inputs layered on top
    pub fn for_step(&self, step: &Step, inputs: Option<&BTreeMap<String, String>>) -> StepContext {
        let mut scoped = self.clone();

        if let Some(inputs) = inputs {
            for (name, value) in inputs {
                let rendered = scoped.render(value);
                scoped.variables.insert(format!("inputs.{}", name), rendered);
            }
        }

        scoped.extend_env(&step.env);

        let mut inputs_env = BTreeMap::new();
        if let Some(inputs) = inputs {
            for name in inputs.keys() {
                if let Some(value) = scoped.variables.get(&format!("inputs.{}", name)) {
                    inputs_env.insert(input_env_name(name), value.clone());
                }
            }
        }
        scoped.env.extend(inputs_env);

        StepContext { context: scoped }
    }
}

/// A job context narrowed to one step
#[derive(Debug, Clone)]
pub struct StepContext {
    context: JobContext,
}

impl StepContext {
    pub fn render(&self, template: &str) -> String {
        self.context.render(template)
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.context.env
    }

    /// Resolved `inputs.*` values
    pub fn inputs(&self) -> BTreeMap<String, String> {
        self.context
            .variables
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("inputs.")
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect()
    }
}

/// `with:` input name as an environment variable (`INPUT_<NAME>`)
pub fn input_env_name(name: &str) -> String {
    let normalized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("INPUT_{}", normalized)
}

fn expression_regex() -> &'static Regex {
    static EXPRESSION: OnceLock<Regex> = OnceLock::new();
    EXPRESSION.get_or_init(|| {
        Regex::new(r"\$\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("expression pattern is valid")
    })
}

/// Replace `${{ path }}` with the matching variable; unknown paths become empty
pub fn render_expressions(template: &str, variables: &HashMap<String, String>) -> String {
    expression_regex()
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                debug!("Unknown expression '{}' rendered as empty", &caps[1]);
                String::new()
            }
        })
        .into_owned()
}
