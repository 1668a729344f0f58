//! Job domain model

use crate::core::config::{minutes_to_duration, string_map, JobConfig};
use crate::core::step::Step;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// A job: an ordered list of steps run on one environment
#[derive(Debug, Clone)]
pub struct Job {
    /// Key under `jobs:`
    pub id: String,

    /// Display name (defaults to the id)
    pub name: String,

    /// Target environment descriptor
    pub runs_on: Vec<String>,

    /// Jobs that must succeed first
    pub needs: Vec<String>,

    /// Job-level environment
    pub env: BTreeMap<String, String>,

    /// Budget for all steps together
    pub timeout: Option<Duration>,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Job {
    /// Create a job from a job config
    pub fn from_config(id: &str, config: &JobConfig) -> Self {
        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_config(index, step))
            .collect();

        Job {
            id: id.to_string(),
            name: config.name.clone().unwrap_or_else(|| id.to_string()),
            runs_on: config.runs_on.to_vec(),
            needs: config.needs.to_vec(),
            env: string_map(&config.env),
            timeout: config.timeout_minutes.and_then(minutes_to_duration),
            steps,
        }
    }

    /// Check if every dependency succeeded
    pub fn dependencies_met(&self, succeeded: &HashSet<String>) -> bool {
        self.needs.iter().all(|need| succeeded.contains(need))
    }

    /// Human-readable `runs-on`
    pub fn runs_on_label(&self) -> String {
        self.runs_on.join(", ")
    }
}
