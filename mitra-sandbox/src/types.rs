//! Core types for sandbox execution

use crate::language::Language;
use serde::{Deserialize, Serialize};

/// Request to execute a snippet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Target language backend
    pub language: Language,

    /// The source to execute
    pub source: String,
}

impl ExecutionRequest {
    /// Create a request for the given language
    pub fn new(language: Language, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
        }
    }

    /// Whitespace-only source counts as missing.
    pub fn has_source(&self) -> bool {
        !self.source.trim().is_empty()
    }
}

/// Normalized result of running a snippet, whatever the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the program completed without error
    pub success: bool,

    /// Captured stdout / console lines, newline-joined
    pub output: String,

    /// Stringified value of the final expression (in-process backend only)
    pub return_value: Option<String>,

    /// Error text reported by the interpreter, compiler or sandbox
    pub error_message: Option<String>,

    /// Human readable budget label, e.g. "< 5s"
    pub execution_time_label: String,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Whether the run was aborted by the timeout
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Successful run with the given captured output
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            return_value: None,
            error_message: None,
            execution_time_label: String::new(),
            duration_ms: 0,
            timed_out: false,
        }
    }

    /// Failed run; `output` holds whatever was captured before the failure
    pub fn failed(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            return_value: None,
            error_message: Some(error.into()),
            execution_time_label: String::new(),
            duration_ms: 0,
            timed_out: false,
        }
    }

    /// Failed run caused by an exhausted time budget
    pub fn timeout(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failed(error, output)
        }
    }

    pub fn with_return_value(mut self, value: impl Into<String>) -> Self {
        self.return_value = Some(value.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_time_label(mut self, label: impl Into<String>) -> Self {
        self.execution_time_label = label.into();
        self
    }
}

/// Which language runtimes the host can serve right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Always true: the V8 backend is embedded in the process
    pub javascript: bool,
    pub python: bool,
    pub java: bool,
}

impl CapabilitySet {
    /// Nothing external installed
    pub fn embedded_only() -> Self {
        Self {
            javascript: true,
            python: false,
            java: false,
        }
    }

    /// Whether the backend for `language` can run
    pub fn supports(&self, language: Language) -> bool {
        match language {
            Language::JavaScript => self.javascript,
            Language::Python => self.python,
            Language::Java => self.java,
        }
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::embedded_only()
    }
}

/// Per-binary probe outcome; Java needs both the compiler and the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolchainReport {
    pub python: bool,
    pub javac: bool,
    pub java: bool,
}

impl ToolchainReport {
    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            javascript: true,
            python: self.python,
            java: self.javac && self.java,
        }
    }
}
