//! Resource limits configuration for sandboxed execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Budgets applied to every execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall-clock budget per stage (evaluation, interpreter run, compile, run)
    pub max_duration: Duration,

    /// Budget for a single toolchain version probe
    pub probe_timeout: Duration,

    /// V8 heap ceiling in bytes for the in-process backend
    pub max_heap_bytes: usize,

    /// Maximum executions running at once (None = unbounded)
    pub max_concurrent: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            max_heap_bytes: 64 * 1024 * 1024, // 64 MB
            max_concurrent: Some(8),
        }
    }
}

impl ResourceLimits {
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Label reported to clients as `executionTime`
    pub fn time_label(&self) -> String {
        let secs = self.max_duration.as_secs_f64();
        if secs.fract() == 0.0 {
            format!("< {}s", secs as u64)
        } else {
            format!("< {:.1}s", secs)
        }
    }
}
