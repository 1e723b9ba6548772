//! External command execution.
//!
//! Every desktop action ends in a child process. [`CommandRunner`] is the seam:
//! [`ShellRunner`] spawns real processes, tests substitute a scripted runner.
//! Commands are passed as program + argument vector and never go through a
//! shell, so file names and user input cannot inject anything.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use deskhand_types::errors::DeskhandError;
use deskhand_types::CommandOutput;
use tokio::process::Command;
use tracing::{debug, warn};

/// A program invocation: executable, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    /// Renders as `KEY=value program arg...`, for logs and test matching.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{key}={value} ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// Returns the captured output on a zero exit status. A non-zero exit, a
    /// missing program or a timeout is an error.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeskhandError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeskhandError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeskhandError::Command(format!("{}: command not found", spec.program))
            } else {
                DeskhandError::Command(format!("failed to start {}: {e}", spec.program))
            }
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                DeskhandError::Timeout(format!(
                    "`{spec}` did not finish within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DeskhandError::Command(format!("failed to wait for `{spec}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                stderr.trim().to_string()
            };
            warn!(command = %spec, status = %output.status, "command failed");
            return Err(DeskhandError::Command(format!("`{spec}` failed: {detail}")));
        }

        if !stderr.trim().is_empty() {
            debug!(command = %spec, stderr = %stderr.trim(), "command wrote to stderr");
        }
        debug!(command = %spec, "command succeeded");
        Ok(CommandOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ShellRunner {
        ShellRunner::new(Duration::from_secs(5))
    }

    #[test]
    fn test_spec_display() {
        let spec = CommandSpec::new("pactl")
            .args(["set-sink-volume", "@DEFAULT_SINK@", "+5%"])
            .env("XDG_RUNTIME_DIR", "/run/user/1000");
        assert_eq!(
            spec.to_string(),
            "XDG_RUNTIME_DIR=/run/user/1000 pactl set-sink-volume @DEFAULT_SINK@ +5%"
        );
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = runner()
            .run(&CommandSpec::new("echo").arg("hello world"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello world\n");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let out = runner()
            .run(&CommandSpec::new("echo").arg("$HOME; rm -rf /"))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "$HOME; rm -rf /");
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let out = runner()
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "printf %s \"$DESKHAND_TEST\""])
                    .env("DESKHAND_TEST", "pulse"),
            )
            .await
            .unwrap();
        assert_eq!(out.stdout, "pulse");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let err = runner()
            .run(&CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskhandError::Command(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = runner()
            .run(&CommandSpec::new("deskhand-no-such-program"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ShellRunner::new(Duration::from_millis(100))
            .run(&CommandSpec::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskhandError::Timeout(_)));
    }
}
