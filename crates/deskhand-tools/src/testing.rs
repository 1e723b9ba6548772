//! Test doubles shared by the desktop backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskhand_types::errors::DeskhandError;
use deskhand_types::CommandOutput;

use crate::shell::{CommandRunner, CommandSpec};

/// Runner answering from a script of `(substring, result)` pairs.
///
/// The first entry whose substring occurs in the rendered command wins;
/// unmatched commands succeed with empty output. `Err` entries become
/// [`DeskhandError::Command`] carrying the given stderr.
pub(crate) struct ScriptedRunner {
    script: Vec<(&'static str, Result<&'static str, &'static str>)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub(crate) fn new(script: Vec<(&'static str, Result<&'static str, &'static str>)>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every command run so far, rendered with [`CommandSpec`]'s `Display`.
    pub(crate) fn rendered(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(ToString::to_string).collect()
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeskhandError> {
        self.calls.lock().unwrap().push(spec.clone());
        let rendered = spec.to_string();
        let answer = self
            .script
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern))
            .map(|(_, result)| *result)
            .unwrap_or(Ok(""));
        match answer {
            Ok(stdout) => Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
            Err(stderr) => Err(DeskhandError::Command(format!("`{rendered}` failed: {stderr}"))),
        }
    }
}
