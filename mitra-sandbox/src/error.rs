use thiserror::Error;

/// Failures of the sandbox itself, as opposed to failures of the user's program
/// (those are reported through `ExecutionResult { success: false, .. }`).
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Code is required")]
    MissingCode,

    #[error("Language not found: {0}")]
    UnknownLanguage(String),

    #[error("Scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal sandbox error: {0}")]
    Internal(String),
}

pub type SandboxResult<T> = Result<T, SandboxError>;
