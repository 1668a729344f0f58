//! Action registry - maps action names to handlers

use crate::actions::{ActionError, ActionRef, CheckoutAction};
use crate::core::{Shell, StepContext};
use crate::environment::{ActionHandlerConfig, RunnerConfig};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What an action step turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Run this script in the job environment
    Script { script: String, shell: Shell },
    /// Succeed without running anything
    Skip { reason: String },
}

/// Trait for action handlers - allows for different implementations
pub trait ActionHandler: Send + Sync + fmt::Debug {
    /// Turn an action invocation into something runnable
    fn resolve(&self, action: &ActionRef, step: &StepContext) -> Result<Resolution, ActionError>;
}

/// Handler backed by a script from the runner config
#[derive(Debug, Clone)]
pub struct ScriptAction {
    script: String,
    shell: Shell,
}

impl ScriptAction {
    pub fn new(script: impl Into<String>, shell: Shell) -> Self {
        Self {
            script: script.into(),
            shell,
        }
    }
}

impl ActionHandler for ScriptAction {
    fn resolve(&self, _action: &ActionRef, step: &StepContext) -> Result<Resolution, ActionError> {
        Ok(Resolution::Script {
            script: step.render(&self.script),
            shell: self.shell.clone(),
        })
    }
}

/// Registry of action handlers keyed by action name (version ignored)
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    allow_unknown: bool,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("actions/checkout", CheckoutAction);
        registry
    }

    /// Built-ins plus the handlers declared in the runner config
    pub fn from_config(config: &RunnerConfig) -> Self {
        let mut registry = Self::with_builtins();
        let default_shell = config.default_shell();

        for (name, handler) in &config.actions {
            let action = match handler {
                ActionHandlerConfig::Script(script) => {
                    ScriptAction::new(script.clone(), default_shell.clone())
                }
                ActionHandlerConfig::Detailed { run, shell } => ScriptAction::new(
                    run.clone(),
                    shell.as_deref().map(Shell::parse).unwrap_or_else(|| default_shell.clone()),
                ),
            };
            registry.register(name, action);
        }

        registry.allow_unknown = config.allow_unknown_actions;
        registry
    }

    /// Register a handler, replacing any previous one for `name`
    pub fn register<H: ActionHandler + 'static>(&mut self, name: &str, handler: H) {
        self.handlers.insert(name.to_ascii_lowercase(), Arc::new(handler));
    }

    /// Treat unknown actions as no-ops instead of failures
    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve an action invocation
    pub fn resolve(&self, action: &ActionRef, step: &StepContext) -> Result<Resolution, ActionError> {
        match self.handlers.get(&action.name.to_ascii_lowercase()) {
            Some(handler) => {
                debug!("Resolving action {} with {:?}", action, handler);
                handler.resolve(action, step)
            }
            None if self.allow_unknown => {
                warn!("No handler for action {}, skipping", action);
                Ok(Resolution::Skip {
                    reason: format!("no handler for {}", action),
                })
            }
            None => Err(ActionError::UnknownAction(action.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkflowConfig;
    use crate::core::{JobContext, RunContext, StepKind, TriggerEvent};
    use std::path::{Path, PathBuf};
    use uuid::Uuid;

    fn step_context(yaml_step: &str) -> (ActionRef, StepContext) {
        let yaml = format!(
            "name: t\non: push\njobs:\n  j:\n    runs-on: linux\n    steps:\n      - {}\n",
            yaml_step
        );
        let workflow = WorkflowConfig::from_yaml(&yaml).unwrap().to_workflow();
        let job = &workflow.jobs[0];
        let run = RunContext {
            run_id: Uuid::new_v4(),
            workflow_name: workflow.name.clone(),
            event: TriggerEvent::push("main"),
            env: workflow.env.clone(),
            source_dir: PathBuf::from("/src"),
        };
        let ctx = JobContext::new(&run, job, Path::new("/ws"));
        let step = &job.steps[0];
        match &step.kind {
            StepKind::Action { action, inputs } => (action.clone(), ctx.for_step(step, Some(inputs))),
            other => panic!("expected action step, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_fails_by_default() {
        let (action, ctx) = step_context("uses: arduino/setup-protoc@v1");
        let registry = ActionRegistry::with_builtins();
        let err = registry.resolve(&action, &ctx).unwrap_err();
        assert!(matches!(err, ActionError::UnknownAction(ref a) if a == "arduino/setup-protoc@v1"));
    }

    #[test]
    fn test_unknown_action_skipped_when_allowed() {
        let (action, ctx) = step_context("uses: arduino/setup-protoc@v1");
        let registry = ActionRegistry::with_builtins().allow_unknown(true);
        assert!(matches!(
            registry.resolve(&action, &ctx).unwrap(),
            Resolution::Skip { .. }
        ));
    }

    #[test]
    fn test_script_action_renders_inputs() {
        let (action, ctx) =
            step_context("{ uses: actions-rs/toolchain@v1, with: { toolchain: nightly } }");
        let mut registry = ActionRegistry::new();
        registry.register(
            "actions-rs/toolchain",
            ScriptAction::new("rustup toolchain install ${{ inputs.toolchain }}", Shell::Sh),
        );

        assert_eq!(
            registry.resolve(&action, &ctx).unwrap(),
            Resolution::Script {
                script: "rustup toolchain install nightly".to_string(),
                shell: Shell::Sh,
            }
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (action, ctx) = step_context("uses: Actions/Checkout@v3");
        let registry = ActionRegistry::with_builtins();
        assert!(registry.contains("actions/checkout"));
        assert!(registry.resolve(&action, &ctx).is_ok());
    }

    #[test]
    fn test_from_config_registers_handlers() {
        let config = RunnerConfig::from_yaml(
            r#"
allow_unknown_actions: true
actions:
  actions-rs/toolchain: "rustup default ${{ inputs.toolchain }}"
  arduino/setup-protoc:
    run: "command -v protoc"
    shell: sh
"#,
        )
        .unwrap();
        let registry = ActionRegistry::from_config(&config);

        assert_eq!(
            registry.names(),
            vec!["actions-rs/toolchain", "actions/checkout", "arduino/setup-protoc"]
        );

        let (action, ctx) = step_context("uses: arduino/setup-protoc@v1");
        assert_eq!(
            registry.resolve(&action, &ctx).unwrap(),
            Resolution::Script {
                script: "command -v protoc".to_string(),
                shell: Shell::Sh,
            }
        );
    }
}
