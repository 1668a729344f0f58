//! Trigger conditions and event matching

use glob_match::glob_match;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The event a run is started for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Event type, e.g. `push` or `pull_request`
    pub name: String,

    /// Branch the event refers to, if any
    pub branch: Option<String>,
}

impl TriggerEvent {
    pub fn new(name: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            name: name.into(),
            branch: branch.map(|b| normalize_branch(&b).to_string()),
        }
    }

    pub fn push(branch: &str) -> Self {
        Self::new("push", Some(branch.to_string()))
    }

    pub fn pull_request(branch: &str) -> Self {
        Self::new("pull_request", Some(branch.to_string()))
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{} ({})", self.name, branch),
            None => write!(f, "{}", self.name),
        }
    }
}

fn normalize_branch(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

/// Branch filter attached to one event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchFilter {
    /// No filter
    Any,
    /// `branches:` - last matching pattern decides, `!` negates
    Include(Vec<String>),
    /// `branches-ignore:`
    Exclude(Vec<String>),
}

impl BranchFilter {
    pub fn matches(&self, branch: Option<&str>) -> bool {
        match self {
            BranchFilter::Any => true,
            BranchFilter::Include(patterns) => {
                let Some(branch) = branch else {
                    return false;
                };
                let mut included = false;
                for pattern in patterns {
                    match pattern.strip_prefix('!') {
                        Some(negated) if glob_match(negated, branch) => included = false,
                        Some(_) => {}
                        None if glob_match(pattern, branch) => included = true,
                        None => {}
                    }
                }
                included
            }
            BranchFilter::Exclude(patterns) => match branch {
                Some(branch) => !patterns.iter().any(|p| glob_match(p, branch)),
                None => true,
            },
        }
    }
}

/// Set of event types a workflow reacts to
#[derive(Debug, Clone, Default)]
pub struct Triggers {
    events: BTreeMap<String, BranchFilter>,
}

impl Triggers {
    pub fn new(events: BTreeMap<String, BranchFilter>) -> Self {
        Self { events }
    }

    /// Check whether an event starts this workflow
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.events
            .get(&event.name)
            .is_some_and(|filter| filter.matches(event.branch.as_deref()))
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }
}
