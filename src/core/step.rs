//! Step domain model

use crate::actions::ActionRef;
use crate::core::config::{minutes_to_duration, string_map, StepConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Position within the job (0-based)
    pub index: usize,

    /// Optional step identifier
    pub id: Option<String>,

    /// Display name
    pub name: String,

    /// What the step does
    pub kind: StepKind,

    /// Step-level environment (values may contain expressions)
    pub env: BTreeMap<String, String>,

    /// Working directory relative to the job workspace
    pub working_directory: Option<String>,

    /// Per-step timeout
    pub timeout: Option<Duration>,
}

/// The two kinds of step
#[derive(Debug, Clone)]
pub enum StepKind {
    /// `uses:` - an opaque external action with a parameter mapping
    Action {
        action: ActionRef,
        inputs: BTreeMap<String, String>,
    },
    /// `run:` - a shell invocation
    Run {
        script: String,
        shell: Option<Shell>,
    },
}

/// Shell used for `run:` steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shell {
    Bash,
    Sh,
    /// Any other program, given the script through `-c`
    Custom(String),
}

impl Shell {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "bash" => Shell::Bash,
            "sh" => Shell::Sh,
            other => Shell::Custom(other.to_string()),
        }
    }

    /// Program and arguments that execute `script`
    pub fn invocation(&self, script: &str) -> (String, Vec<String>) {
        match self {
            Shell::Bash => (
                "bash".to_string(),
                vec![
                    "--noprofile".to_string(),
                    "--norc".to_string(),
                    "-eo".to_string(),
                    "pipefail".to_string(),
                    "-c".to_string(),
                    script.to_string(),
                ],
            ),
            Shell::Sh => (
                "sh".to_string(),
                vec!["-e".to_string(), "-c".to_string(), script.to_string()],
            ),
            Shell::Custom(program) => (
                program.clone(),
                vec!["-c".to_string(), script.to_string()],
            ),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::Bash
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shell::Bash => write!(f, "bash"),
            Shell::Sh => write!(f, "sh"),
            Shell::Custom(program) => write!(f, "{}", program),
        }
    }
}

impl Step {
    /// Create a step from a step config
    ///
    /// The config must already be validated.
    pub fn from_config(index: usize, config: &StepConfig) -> Self {
        let kind = match (&config.uses, &config.run) {
            (Some(uses), _) => StepKind::Action {
                action: ActionRef::parse(uses).unwrap_or_else(|_| ActionRef::local(uses)),
                inputs: config.with.as_ref().map(string_map).unwrap_or_default(),
            },
            (None, run) => StepKind::Run {
                script: run.clone().unwrap_or_default(),
                shell: config.shell.as_deref().map(Shell::parse),
            },
        };

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| default_name(&kind));

        Step {
            index,
            id: config.id.clone(),
            name,
            kind,
            env: string_map(&config.env),
            working_directory: config.working_directory.clone(),
            timeout: config.timeout_minutes.and_then(minutes_to_duration),
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, StepKind::Action { .. })
    }
}

fn default_name(kind: &StepKind) -> String {
    match kind {
        StepKind::Action { action, .. } => format!("Run {}", action),
        StepKind::Run { script, .. } => {
            let first_line = script.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
            format!("Run {}", first_line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_config(yaml: &str) -> StepConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_default_name_uses_first_command_line() {
        let config = step_config("run: |\n\n  cargo fmt -- --check\n  cargo clippy\n");
        let step = Step::from_config(0, &config);
        assert_eq!(step.name, "Run cargo fmt -- --check");
    }

    #[test]
    fn test_default_name_for_action() {
        let config = step_config("uses: actions/checkout@v3");
        let step = Step::from_config(2, &config);
        assert_eq!(step.name, "Run actions/checkout@v3");
        assert_eq!(step.index, 2);
        assert!(step.is_action());
    }

    #[test]
    fn test_action_inputs_are_stringified() {
        let config = step_config(
            "uses: actions-rs/toolchain@v1\nwith:\n  toolchain: stable\n  override: true\n  depth: 1\n",
        );
        let step = Step::from_config(0, &config);
        match step.kind {
            StepKind::Action { action, inputs } => {
                assert_eq!(action.name, "actions-rs/toolchain");
                assert_eq!(inputs.get("override"), Some(&"true".to_string()));
                assert_eq!(inputs.get("depth"), Some(&"1".to_string()));
            }
            other => panic!("expected action step, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_minutes() {
        let config = step_config("run: make\ntimeout-minutes: 2\nshell: sh\n");
        let step = Step::from_config(0, &config);
        assert_eq!(step.timeout, Some(Duration::from_secs(120)));
        match step.kind {
            StepKind::Run { shell, .. } => assert_eq!(shell, Some(Shell::Sh)),
            other => panic!("expected run step, got {:?}", other),
        }
    }

    #[test]
    fn test_shell_invocation() {
        let (program, args) = Shell::Bash.invocation("echo hi");
        assert_eq!(program, "bash");
        assert_eq!(args.last().map(String::as_str), Some("echo hi"));
        assert!(args.contains(&"pipefail".to_string()));

        let (program, args) = Shell::parse("zsh").invocation("ls");
        assert_eq!(program, "zsh");
        assert_eq!(args, vec!["-c".to_string(), "ls".to_string()]);
    }
}
