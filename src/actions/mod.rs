//! Action references and the registry that resolves them to commands
//!
//! A `uses:` step names an external action. The runner treats every action
//! as opaque: a handler turns the reference and its inputs into a script
//! that runs in the job environment like any `run:` step.

pub mod checkout;
pub mod registry;

pub use checkout::CheckoutAction;
pub use registry::{ActionHandler, ActionRegistry, Resolution, ScriptAction};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error types for action resolution
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid action reference '{0}': {1}")]
    InvalidReference(String, String),

    #[error("no handler registered for action '{0}'")]
    UnknownAction(String),
}

/// A parsed `uses:` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// `owner/repo[/path]`, or a `./` path for local actions
    pub name: String,

    /// Part after `@`
    pub version: Option<String>,
}

impl ActionRef {
    /// Parse `owner/repo[/path]@ref` or `./local/path`
    pub fn parse(reference: &str) -> Result<Self, ActionError> {
        let reference = reference.trim();
        let invalid = |reason: &str| ActionError::InvalidReference(reference.to_string(), reason.to_string());

        if reference.is_empty() {
            return Err(invalid("empty reference"));
        }

        if reference.starts_with("./") || reference.starts_with("../") {
            return Ok(Self::local(reference));
        }

        let (name, version) = match reference.split_once('@') {
            Some((name, version)) => {
                if version.is_empty() {
                    return Err(invalid("empty version after '@'"));
                }
                (name, Some(version.to_string()))
            }
            None => return Err(invalid("expected owner/repo@ref")),
        };

        let mut segments = name.split('/');
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() || segments.any(str::is_empty) {
            return Err(invalid("expected owner/repo@ref"));
        }

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    pub fn local(path: &str) -> Self {
        Self {
            name: path.to_string(),
            version: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.name.starts_with("./") || self.name.starts_with("../")
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}
