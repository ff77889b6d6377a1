//! Supported snippet languages

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of languages with an execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Evaluated in-process by an embedded V8 isolate
    JavaScript,
    /// Interpreted by an external python3 process
    Python,
    /// Compiled by javac, then run by java
    Java,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::Python, Language::Java];

    /// Canonical lowercase name used in routes and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
        }
    }

    /// Whether the backend needs a toolchain installed on the host
    pub fn requires_toolchain(self) -> bool {
        !matches!(self, Language::JavaScript)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            _ => Err(SandboxError::UnknownLanguage(s.to_string())),
        }
    }
}
