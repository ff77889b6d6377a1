//! Capability probing: which language toolchains are installed on this host

use crate::runtime::run_bounded;
use crate::types::{CapabilitySet, ToolchainReport};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::RwLock;

/// Runs version checks for the external toolchains
#[derive(Debug, Clone)]
pub struct CapabilityProber {
    python_bin: String,
    javac_bin: String,
    java_bin: String,
    timeout: Duration,
}

impl CapabilityProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            python_bin: "python3".to_string(),
            javac_bin: "javac".to_string(),
            java_bin: "java".to_string(),
            timeout,
        }
    }

    pub fn with_python(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    pub fn with_java(mut self, javac_bin: impl Into<String>, java_bin: impl Into<String>) -> Self {
        self.javac_bin = javac_bin.into();
        self.java_bin = java_bin.into();
        self
    }

    /// Probe every toolchain concurrently. Never fails: any error means "unavailable".
    pub async fn probe(&self) -> CapabilitySet {
        self.probe_toolchains().await.capabilities()
    }

    /// Like [`probe`](Self::probe), keeping the compiler and launcher apart
    pub async fn probe_toolchains(&self) -> ToolchainReport {
        let (python, javac, java) = tokio::join!(
            self.check(&self.python_bin, "--version"),
            self.check(&self.javac_bin, "-version"),
            self.check(&self.java_bin, "-version"),
        );

        let report = ToolchainReport { python, javac, java };
        tracing::debug!(?report, "Probed language toolchains");
        report
    }

    async fn check(&self, program: &str, version_flag: &str) -> bool {
        let mut command = Command::new(program);
        command.arg(version_flag);

        match run_bounded(command, self.timeout).await {
            Ok(outcome) => outcome.success(),
            Err(e) => {
                tracing::debug!(program, error = %e, "Toolchain probe failed");
                false
            }
        }
    }
}

impl Default for CapabilityProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

/// Keeps the last probe result for a short interval
pub struct CachedProber {
    prober: CapabilityProber,
    ttl: Duration,
    cached: RwLock<Option<(Instant, ToolchainReport)>>,
}

impl CachedProber {
    pub fn new(prober: CapabilityProber, ttl: Duration) -> Self {
        Self {
            prober,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn capabilities(&self) -> CapabilitySet {
        self.toolchains().await.capabilities()
    }

    /// Cached probe report, re-probing once the TTL has elapsed
    pub async fn toolchains(&self) -> ToolchainReport {
        if let Some((at, report)) = *self.cached.read().await {
            if at.elapsed() < self.ttl {
                return report;
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some((at, report)) = *cached {
            if at.elapsed() < self.ttl {
                return report;
            }
        }

        let report = self.prober.probe_toolchains().await;
        *cached = Some((Instant::now(), report));
        report
    }
}
