//! Workflow configuration from YAML

use crate::actions::ActionRef;
use crate::core::trigger::{BranchFilter, Triggers};
use crate::core::Workflow;
use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Trigger conditions
    #[serde(rename = "on")]
    pub on: TriggerConfig,

    /// Workflow-level environment
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Jobs in declaration order
    pub jobs: JobsConfig,
}

/// The `on:` key, in any of its three accepted shapes
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TriggerConfig {
    /// `on: push`
    Single(String),
    /// `on: [push, pull_request]`
    List(Vec<String>),
    /// `on: { push: { branches: [main] } }`
    Map(BTreeMap<String, Option<EventSpec>>),
}

impl<'de> Deserialize<'de> for TriggerConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(name) => Ok(TriggerConfig::Single(name)),
            Value::Sequence(_) => Vec::<String>::deserialize(value)
                .map(TriggerConfig::List)
                .map_err(|e| D::Error::custom(format!("invalid 'on' event list: {}", e))),
            Value::Mapping(_) => BTreeMap::<String, Option<EventSpec>>::deserialize(value)
                .map(TriggerConfig::Map)
                .map_err(D::Error::custom),
            _ => Err(D::Error::custom(
                "'on' must be an event name, a list of events or a mapping",
            )),
        }
    }
}

/// Body of one event under a mapping-style `on:`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventSpec {
    /// A mapping; only the branch keys are interpreted
    Filter(EventFilterConfig),
    /// A non-mapping body (e.g. a `schedule` list), accepted and ignored
    Other(Value),
}

impl<'de> Deserialize<'de> for EventSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.is_mapping() {
            return Ok(EventSpec::Other(value));
        }
        EventFilterConfig::deserialize(value)
            .map(EventSpec::Filter)
            .map_err(|e| serde::de::Error::custom(format!("invalid event filter: {}", e)))
    }
}

impl EventSpec {
    pub fn filter(&self) -> Option<&EventFilterConfig> {
        match self {
            EventSpec::Filter(filter) => Some(filter),
            EventSpec::Other(_) => None,
        }
    }
}

/// Per-event filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<OneOrMany>,

    #[serde(default, rename = "branches-ignore", skip_serializing_if = "Option::is_none")]
    pub branches_ignore: Option<OneOrMany>,
}

/// A value that may be written as a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    /// Human-readable job name
    #[serde(default)]
    pub name: Option<String>,

    /// Target environment descriptor
    pub runs_on: OneOrMany,

    /// Jobs this job depends on
    #[serde(default)]
    pub needs: OneOrMany,

    /// Job-level environment
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Budget for the whole job
    #[serde(default)]
    pub timeout_minutes: Option<u64>,

    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Action reference (`owner/repo@ref`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Action inputs
    #[serde(default, rename = "with")]
    pub with: Option<BTreeMap<String, Value>>,

    /// Shell command
    #[serde(default)]
    pub run: Option<String>,

    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    #[serde(default)]
    pub timeout_minutes: Option<u64>,
}

/// An ordered `jobs:` mapping
#[derive(Debug, Clone, Default)]
pub struct JobsConfig(pub Vec<(String, JobConfig)>);

impl JobsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobConfig)> {
        self.0.iter().map(|(id, job)| (id, job))
    }

    pub fn get(&self, id: &str) -> Option<&JobConfig> {
        self.0.iter().find(|(job_id, _)| job_id == id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for JobsConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, job) in &self.0 {
            map.serialize_entry(id, job)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JobsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JobsVisitor;

        impl<'de> Visitor<'de> for JobsVisitor {
            type Value = JobsConfig;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of job ids to jobs")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut jobs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, job)) = access.next_entry::<String, JobConfig>()? {
                    if jobs.iter().any(|(existing, _): &(String, JobConfig)| *existing == id) {
                        return Err(serde::de::Error::custom(format!("duplicate job id: {}", id)));
                    }
                    jobs.push((id, job));
                }
                Ok(JobsConfig(jobs))
            }
        }

        deserializer.deserialize_map(JobsVisitor)
    }
}

/// Longest accepted `timeout-minutes` (one year)
pub const MAX_TIMEOUT_MINUTES: u64 = 365 * 24 * 60;

/// `timeout-minutes` as a duration; `None` for zero or out-of-range values
pub fn minutes_to_duration(minutes: u64) -> Option<Duration> {
    if minutes == 0 || minutes > MAX_TIMEOUT_MINUTES {
        return None;
    }
    minutes.checked_mul(60).map(Duration::from_secs)
}

/// Render a scalar YAML value as an environment string
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Convert a YAML env/with mapping into strings
pub fn string_map(values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), scalar_to_string(v)))
        .collect()
}

impl TriggerConfig {
    /// Build the domain trigger set
    pub fn to_triggers(&self) -> Triggers {
        let mut events = BTreeMap::new();
        match self {
            TriggerConfig::Single(name) => {
                events.insert(name.clone(), BranchFilter::Any);
            }
            TriggerConfig::List(names) => {
                for name in names {
                    events.insert(name.clone(), BranchFilter::Any);
                }
            }
            TriggerConfig::Map(map) => {
                for (name, spec) in map {
                    let filter = match spec.as_ref().and_then(EventSpec::filter) {
                        Some(EventFilterConfig { branches: Some(patterns), .. }) => {
                            BranchFilter::Include(patterns.to_vec())
                        }
                        Some(EventFilterConfig { branches_ignore: Some(patterns), .. }) => {
                            BranchFilter::Exclude(patterns.to_vec())
                        }
                        _ => BranchFilter::Any,
                    };
                    events.insert(name.clone(), filter);
                }
            }
        }
        Triggers::new(events)
    }

    fn event_names(&self) -> Vec<&str> {
        match self {
            TriggerConfig::Single(name) => vec![name.as_str()],
            TriggerConfig::List(names) => names.iter().map(String::as_str).collect(),
            TriggerConfig::Map(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.on.event_names().iter().all(|name| name.trim().is_empty()) {
            anyhow::bail!("Workflow '{}' declares no trigger events", self.name);
        }

        if let TriggerConfig::Map(map) = &self.on {
            for (event, spec) in map {
                if let Some(EventFilterConfig { branches: Some(_), branches_ignore: Some(_) }) =
                    spec.as_ref().and_then(EventSpec::filter)
                {
                    anyhow::bail!(
                        "Event '{}' cannot set both 'branches' and 'branches-ignore'",
                        event
                    );
                }
            }
        }

        if self.jobs.is_empty() {
            anyhow::bail!("Workflow '{}' declares no jobs", self.name);
        }

        let job_ids: HashSet<&str> = self.jobs.iter().map(|(id, _)| id.as_str()).collect();
        for (job_id, job) in self.jobs.iter() {
            if job.runs_on.to_vec().is_empty() {
                anyhow::bail!("Job '{}' has an empty 'runs-on'", job_id);
            }
            if job.steps.is_empty() {
                anyhow::bail!("Job '{}' has no steps", job_id);
            }
            if let Some(minutes) = job.timeout_minutes {
                if minutes_to_duration(minutes).is_none() {
                    anyhow::bail!(
                        "Job '{}' has an invalid 'timeout-minutes': {}",
                        job_id,
                        minutes
                    );
                }
            }

            for need in job.needs.to_vec() {
                if need == *job_id {
                    anyhow::bail!("Job '{}' cannot depend on itself", job_id);
                }
                if !job_ids.contains(need.as_str()) {
                    anyhow::bail!("Job '{}' needs non-existent job '{}'", job_id, need);
                }
            }

            let mut step_ids = HashSet::new();
            for (index, step) in job.steps.iter().enumerate() {
                step.validate(job_id, index)?;
                if let Some(id) = &step.id {
                    if !step_ids.insert(id.as_str()) {
                        anyhow::bail!("Job '{}' has duplicate step id '{}'", job_id, id);
                    }
                }
            }
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Check for cycles in the `needs` graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for (job_id, _) in self.jobs.iter() {
            if !visited.contains(job_id.as_str()) {
                self.dfs_check(job_id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        job_id: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(job_id.to_string());
        recursion_stack.insert(job_id.to_string());

        if let Some(job) = self.jobs.get(job_id) {
            for need in job.needs.to_vec() {
                if recursion_stack.contains(&need) {
                    anyhow::bail!("Cycle detected in job dependencies involving '{}'", need);
                }
                if !visited.contains(&need) {
                    self.dfs_check(&need, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(job_id);
        Ok(())
    }

    /// Workflow env as strings, with overrides applied last
    pub fn env_with_overrides(&self, overrides: &HashMap<String, String>) -> BTreeMap<String, String> {
        let mut env = string_map(&self.env);
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Workflow {
        Workflow::from_config(self)
    }
}

impl StepConfig {
    fn validate(&self, job_id: &str, index: usize) -> Result<()> {
        let label = self
            .id
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| format!("#{}", index + 1));

        match (&self.uses, &self.run) {
            (Some(_), Some(_)) => anyhow::bail!(
                "Step '{}' in job '{}' sets both 'uses' and 'run'",
                label,
                job_id
            ),
            (None, None) => anyhow::bail!(
                "Step '{}' in job '{}' needs either 'uses' or 'run'",
                label,
                job_id
            ),
            (Some(uses), None) => {
                if self.shell.is_some() {
                    anyhow::bail!(
                        "Step '{}' in job '{}' sets 'shell' on an action step",
                        label,
                        job_id
                    );
                }
                ActionRef::parse(uses).map_err(|e| {
                    anyhow::anyhow!("Step '{}' in job '{}': {}", label, job_id, e)
                })?;
            }
            (None, Some(run)) => {
                if self.with.is_some() {
                    anyhow::bail!(
                        "Step '{}' in job '{}' sets 'with' on a run step",
                        label,
                        job_id
                    );
                }
                if run.trim().is_empty() {
                    anyhow::bail!("Step '{}' in job '{}' has an empty 'run'", label, job_id);
                }
            }
        }

        if let Some(minutes) = self.timeout_minutes {
            if minutes_to_duration(minutes).is_none() {
                anyhow::bail!(
                    "Step '{}' in job '{}' has an invalid 'timeout-minutes': {}",
                    label,
                    job_id,
                    minutes
                );
            }
        }

        Ok(())
    }
}
