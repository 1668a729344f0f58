//! Workflow domain model

use crate::core::{
    config::WorkflowConfig,
    job::Job,
    run::WorkflowRun,
    trigger::{TriggerEvent, Triggers},
};
use anyhow::Result;
use std::collections::{BTreeMap, HashSet};

/// A workflow definition
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Events that start the workflow
    pub triggers: Triggers,

    /// Workflow-level environment
    pub env: BTreeMap<String, String>,

    /// Jobs in declaration order
    pub jobs: Vec<Job>,

    /// Job execution order (topological by `needs`)
    execution_order: Vec<String>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let jobs: Vec<Job> = config
            .jobs
            .iter()
            .map(|(id, job)| Job::from_config(id, job))
            .collect();

        let execution_order = Self::topological_sort(&jobs);

        Workflow {
            name: config.name.clone(),
            triggers: config.on.to_triggers(),
            env: crate::core::config::string_map(&config.env),
            jobs,
            execution_order,
        }
    }

    /// Get a job by ID
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Check whether an event starts this workflow
    pub fn is_triggered_by(&self, event: &TriggerEvent) -> bool {
        self.triggers.matches(event)
    }

    /// Get execution order
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Select the jobs an event runs
    ///
    /// With a non-empty `only`, just those jobs and their transitive needs are selected.
    /// An event that does not trigger the workflow yields an empty run.
    pub fn plan(&self, event: &TriggerEvent, only: &[String]) -> Result<WorkflowRun> {
        for id in only {
            if self.job(id).is_none() {
                anyhow::bail!("Workflow '{}' has no job named '{}'", self.name, id);
            }
        }

        if !self.is_triggered_by(event) {
            return Ok(WorkflowRun::new(&self.name, event.clone(), Vec::new()));
        }

        let selected: HashSet<String> = if only.is_empty() {
            self.jobs.iter().map(|j| j.id.clone()).collect()
        } else {
            let mut selected = HashSet::new();
            for id in only {
                self.collect_needs(id, &mut selected);
            }
            selected
        };

        let jobs = self
            .execution_order
            .iter()
            .filter(|id| selected.contains(*id))
            .filter_map(|id| self.job(id).cloned())
            .collect();

        Ok(WorkflowRun::new(&self.name, event.clone(), jobs))
    }

    fn collect_needs(&self, id: &str, selected: &mut HashSet<String>) {
        if !selected.insert(id.to_string()) {
            return;
        }
        if let Some(job) = self.job(id) {
            for need in &job.needs {
                self.collect_needs(need, selected);
            }
        }
    }

    /// Topological sort of jobs; ties keep declaration order
    fn topological_sort(jobs: &[Job]) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for job in jobs {
            Self::visit(&job.id, jobs, &mut visited, &mut result);
        }

        result
    }

    fn visit(job_id: &str, jobs: &[Job], visited: &mut HashSet<String>, result: &mut Vec<String>) {
        if !visited.insert(job_id.to_string()) {
            return;
        }

        if let Some(job) = jobs.iter().find(|j| j.id == job_id) {
            for need in &job.needs {
                Self::visit(need, jobs, visited, result);
            }
        }

        result.push(job_id.to_string());
    }
}
