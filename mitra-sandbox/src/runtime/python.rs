//! Python runtime: scratch file + unbuffered interpreter subprocess

use super::process::run_bounded;
use super::{normalize_output, Runtime};
use crate::error::{SandboxError, SandboxResult};
use crate::language::Language;
use crate::limits::ResourceLimits;
use crate::scratch::ScratchRoot;
use crate::types::{ExecutionResult, ToolchainReport};
use async_trait::async_trait;
use tokio::process::Command;

const NOT_INSTALLED: &str =
    "Python runtime is not installed on the server. Install python3 to run Python code.";

/// Runs each snippet as `<python> -u <scratch>/<uuid>.py`
pub struct PythonRuntime {
    interpreter: String,
    scratch: ScratchRoot,
    limits: ResourceLimits,
}

impl PythonRuntime {
    pub fn new(scratch: ScratchRoot, limits: ResourceLimits) -> Self {
        Self {
            interpreter: "python3".to_string(),
            scratch,
            limits,
        }
    }

    /// Use a specific interpreter binary
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[async_trait]
impl Runtime for PythonRuntime {
    async fn run(&self, source: &str) -> SandboxResult<ExecutionResult> {
        let script = self.scratch.write_file("py", source).await?;

        let mut command = Command::new(&self.interpreter);
        command.arg("-u").arg(script.path());

        let outcome = match run_bounded(command, self.limits.max_duration).await {
            Ok(outcome) => outcome,
            Err(SandboxError::Spawn { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(ExecutionResult::failed(NOT_INSTALLED, ""));
            }
            Err(e) => return Err(e),
        };
        // `script` is still alive here and is removed when this scope ends

        if outcome.timed_out {
            return Ok(ExecutionResult::timeout(
                format!(
                    "Python execution timed out after {}s",
                    self.limits.max_duration.as_secs_f64()
                ),
                normalize_output(&outcome.stdout),
            ));
        }

        if outcome.success() {
            return Ok(ExecutionResult::succeeded(normalize_output(&outcome.stdout)));
        }

        let error = last_error_line(&outcome.stderr).unwrap_or_else(|| match outcome.exit_code {
            Some(code) => format!("Python execution failed (exit code {})", code),
            None => "Python execution failed".to_string(),
        });
        Ok(ExecutionResult::failed(error, normalize_output(&outcome.stderr)))
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn name(&self) -> &str {
        "python"
    }

    fn missing_toolchain_message(&self, _toolchains: &ToolchainReport) -> String {
        NOT_INSTALLED.to_string()
    }
}

/// The exception summary python prints last, e.g. `NameError: name 'x' is not defined`
fn last_error_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
