//! Java runtime: compile with javac, then run with java, each stage time-boxed.
//!
//! Every execution gets its own scratch directory, so two submissions with the
//! same class name never share `Main.java` / `Main.class`.

use super::process::{run_bounded, ProcessOutcome};
use super::{normalize_output, Runtime};
use crate::error::{SandboxError, SandboxResult};
use crate::language::Language;
use crate::limits::ResourceLimits;
use crate::scratch::ScratchRoot;
use crate::types::{ExecutionResult, ToolchainReport};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;

/// Class name used when the source declares no public class
pub const FALLBACK_CLASS_NAME: &str = "Main";

const NO_OUTPUT_MESSAGE: &str = "Program executed successfully (no output)";

fn public_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"public\s+(?:(?:final|abstract|sealed|strictfp)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
            .expect("static regex is valid")
    })
}

/// Find the top-level public class name.
///
/// Returns `Ok("Main")` when nothing matches and `Err(names)` when more than one
/// top-level public class is declared. Nested classes (brace depth > 0) are ignored.
pub fn extract_class_name(source: &str) -> Result<String, Vec<String>> {
    let names: Vec<String> = public_class_pattern()
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            (brace_depth(&source[..whole.start()]) == 0).then(|| caps[1].to_string())
        })
        .collect();

    match names.len() {
        0 => Ok(FALLBACK_CLASS_NAME.to_string()),
        1 => Ok(names.into_iter().next().unwrap_or_default()),
        _ => Err(names),
    }
}

fn brace_depth(prefix: &str) -> i64 {
    prefix.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// Compile-then-run backend
pub struct JavaRuntime {
    javac: String,
    java: String,
    scratch: ScratchRoot,
    limits: ResourceLimits,
}

impl JavaRuntime {
    pub fn new(scratch: ScratchRoot, limits: ResourceLimits) -> Self {
        Self {
            javac: "javac".to_string(),
            java: "java".to_string(),
            scratch,
            limits,
        }
    }

    /// Use specific compiler and launcher binaries
    pub fn with_toolchain(mut self, javac: impl Into<String>, java: impl Into<String>) -> Self {
        self.javac = javac.into();
        self.java = java.into();
        self
    }

    fn compiler_missing(&self) -> String {
        format!(
            "Java compiler ({}) is not installed on the server. Install a JDK to run Java code.",
            self.javac
        )
    }

    fn launcher_missing(&self) -> String {
        format!(
            "Java launcher ({}) is not installed on the server. Install a JDK to run Java code.",
            self.java
        )
    }

    fn budget_secs(&self) -> f64 {
        self.limits.max_duration.as_secs_f64()
    }

    /// Spawn failures with NotFound mean the JDK is missing
    async fn stage(&self, command: Command) -> SandboxResult<Option<ProcessOutcome>> {
        match run_bounded(command, self.limits.max_duration).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(SandboxError::Spawn { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Runtime for JavaRuntime {
    async fn run(&self, source: &str) -> SandboxResult<ExecutionResult> {
        let class_name = match extract_class_name(source) {
            Ok(name) => name,
            Err(names) => {
                return Ok(ExecutionResult::failed(
                    format!(
                        "Multiple public classes found ({}); submit exactly one public class",
                        names.join(", ")
                    ),
                    "",
                ))
            }
        };

        let workdir = self.scratch.create_dir().await?;
        let source_path = workdir
            .write(&format!("{}.java", class_name), source)
            .await?;

        tracing::debug!(class_name = %class_name, dir = %workdir.path().display(), "Compiling Java source");

        let mut javac = Command::new(&self.javac);
        javac
            .arg("-d")
            .arg(workdir.path())
            .arg(&source_path)
            .current_dir(workdir.path());

        let Some(compile) = self.stage(javac).await? else {
            return Ok(ExecutionResult::failed(self.compiler_missing(), ""));
        };

        if compile.timed_out {
            return Ok(ExecutionResult::timeout(
                format!("Compilation timed out after {}s", self.budget_secs()),
                "",
            ));
        }

        // Any compiler diagnostic is fatal, even with exit code 0
        let diagnostics = normalize_output(&compile.stderr);
        if !diagnostics.trim().is_empty() || !compile.success() {
            let error = if diagnostics.trim().is_empty() {
                format!(
                    "Java compilation failed (exit code {})",
                    compile.exit_code.unwrap_or(-1)
                )
            } else {
                diagnostics.clone()
            };
            return Ok(ExecutionResult::failed(error, diagnostics));
        }

        let mut java = Command::new(&self.java);
        java.arg("-cp").arg(workdir.path()).arg(&class_name);

        let Some(run) = self.stage(java).await? else {
            return Ok(ExecutionResult::failed(self.launcher_missing(), ""));
        };

        let stdout = normalize_output(&run.stdout);
        let stderr = normalize_output(&run.stderr);

        if run.timed_out {
            return Ok(ExecutionResult::timeout(
                format!("Java execution timed out after {}s", self.budget_secs()),
                stdout,
            ));
        }

        if !run.success() {
            let error = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!(
                        "Java execution failed (exit code {})",
                        run.exit_code.unwrap_or(-1)
                    )
                });
            return Ok(ExecutionResult::failed(error, stderr));
        }

        if stdout.is_empty() {
            Ok(ExecutionResult::succeeded(NO_OUTPUT_MESSAGE))
        } else {
            Ok(ExecutionResult::succeeded(stdout))
        }
    }

    fn language(&self) -> Language {
        Language::Java
    }

    fn name(&self) -> &str {
        "java"
    }

    fn missing_toolchain_message(&self, toolchains: &ToolchainReport) -> String {
        if toolchains.javac {
            self.launcher_missing()
        } else {
            self.compiler_missing()
        }
    }
}
