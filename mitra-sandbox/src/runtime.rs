//! Runtime trait and the per-language backends

mod java;
mod process;
mod python;
mod v8;

use crate::error::SandboxResult;
use crate::language::Language;
use crate::types::{ExecutionResult, ToolchainReport};
use async_trait::async_trait;

pub use java::{extract_class_name, JavaRuntime};
pub use process::{run_bounded, ProcessOutcome};
pub use python::PythonRuntime;
pub use v8::V8Runtime;

/// One execution strategy per language
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run `source` to completion (or timeout) and report the outcome.
    ///
    /// A failing user program is `Ok(ExecutionResult { success: false, .. })`;
    /// `Err` is reserved for sandbox infrastructure failures.
    async fn run(&self, source: &str) -> SandboxResult<ExecutionResult>;

    /// Language served by this backend
    fn language(&self) -> Language;

    /// Get runtime name
    fn name(&self) -> &str;

    /// Message reported when the host toolchain for this backend is missing
    fn missing_toolchain_message(&self, _toolchains: &ToolchainReport) -> String {
        format!("{} runtime is not installed on the server", self.language())
    }
}

/// Normalize captured text: CRLF to LF, trailing newlines dropped.
pub(crate) fn normalize_output(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim_end_matches('\n').to_string()
}
