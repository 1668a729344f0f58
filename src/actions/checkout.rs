//! Built-in `actions/checkout`

use crate::actions::{ActionError, ActionHandler, ActionRef, Resolution};
use crate::core::{Shell, StepContext};

/// Clones the run's source repository into the job workspace
///
/// Inputs: `ref` (checked out after cloning) and `path` (clone target
/// relative to the workspace, default `.`). Values reach the script through
/// `INPUT_*` variables, so nothing is spliced into shell text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutAction;

impl ActionHandler for CheckoutAction {
    fn resolve(&self, _action: &ActionRef, step: &StepContext) -> Result<Resolution, ActionError> {
        let inputs = step.inputs();
        let has_path = inputs.get("path").is_some_and(|p| !p.is_empty());
        let has_ref = inputs.get("ref").is_some_and(|r| !r.is_empty());

        let target = if has_path { "\"$INPUT_PATH\"" } else { "." };
        let mut script = format!(
            "git clone --quiet --no-hardlinks \"$PIPELINE_SOURCE\" {}",
            target
        );
        if has_ref {
            script.push_str(&format!("\ngit -C {} checkout --quiet \"$INPUT_REF\"", target));
        }

        Ok(Resolution::Script {
            script,
            shell: Shell::Sh,
        })
    }
}
