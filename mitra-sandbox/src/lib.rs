//! Mitra Sandbox - short-lived code execution for the chat assistant
//!
//! Runs user snippets in one of three backends behind a single coordinator:
//! an embedded V8 isolate for JavaScript, a `python3` subprocess, and a
//! `javac` + `java` compile-then-run pipeline.

mod error;
mod language;
mod limits;
mod probe;
mod runtime;
mod scratch;
mod service;
mod types;

pub use error::{SandboxError, SandboxResult};
pub use language::Language;
pub use limits::ResourceLimits;
pub use probe::{CachedProber, CapabilityProber};
pub use runtime::{
    extract_class_name, run_bounded, JavaRuntime, ProcessOutcome, PythonRuntime, Runtime, V8Runtime,
};
pub use scratch::{ScratchDir, ScratchFile, ScratchRoot};
pub use service::{SandboxConfig, SandboxService};
pub use types::{CapabilitySet, ExecutionRequest, ExecutionResult, ToolchainReport};
