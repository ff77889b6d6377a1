//! Sandbox service - main entry point

use crate::error::{SandboxError, SandboxResult};
use crate::language::Language;
use crate::limits::ResourceLimits;
use crate::probe::{CachedProber, CapabilityProber};
use crate::runtime::{JavaRuntime, PythonRuntime, Runtime, V8Runtime};
use crate::scratch::ScratchRoot;
use crate::types::{CapabilitySet, ExecutionRequest, ExecutionResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Generic message when a backend fails without saying why
const FALLBACK_ERROR: &str = "Code execution failed";

/// Everything needed to build a [`SandboxService`]
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub scratch_root: ScratchRoot,
    pub limits: ResourceLimits,
    pub capability_ttl: Duration,
    pub python_bin: String,
    pub javac_bin: String,
    pub java_bin: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            scratch_root: ScratchRoot::default(),
            limits: ResourceLimits::default(),
            capability_ttl: Duration::from_secs(60),
            python_bin: "python3".to_string(),
            javac_bin: "javac".to_string(),
            java_bin: "java".to_string(),
        }
    }
}

/// The execution coordinator.
///
/// Validates requests, checks toolchain availability, dispatches to the backend
/// for the language, and normalizes every outcome into one [`ExecutionResult`].
pub struct SandboxService {
    javascript: Arc<dyn Runtime>,
    python: Arc<dyn Runtime>,
    java: Arc<dyn Runtime>,
    capabilities: Arc<CachedProber>,
    limits: ResourceLimits,
    permits: Option<Arc<Semaphore>>,
}

impl SandboxService {
    /// Build the standard V8 / python3 / javac+java backends
    pub fn new(config: SandboxConfig) -> Self {
        let SandboxConfig {
            scratch_root,
            limits,
            capability_ttl,
            python_bin,
            javac_bin,
            java_bin,
        } = config;

        let prober = CapabilityProber::new(limits.probe_timeout)
            .with_python(python_bin.clone())
            .with_java(javac_bin.clone(), java_bin.clone());

        Self::with_runtimes(
            V8Runtime::with_limits(limits.clone()),
            PythonRuntime::new(scratch_root.clone(), limits.clone()).with_interpreter(python_bin),
            JavaRuntime::new(scratch_root, limits.clone()).with_toolchain(javac_bin, java_bin),
            CachedProber::new(prober, capability_ttl),
            limits,
        )
    }

    /// Assemble a service from explicit backends
    pub fn with_runtimes(
        javascript: impl Runtime + 'static,
        python: impl Runtime + 'static,
        java: impl Runtime + 'static,
        capabilities: CachedProber,
        limits: ResourceLimits,
    ) -> Self {
        let permits = limits
            .max_concurrent
            .map(|max| Arc::new(Semaphore::new(max.max(1))));
        Self {
            javascript: Arc::new(javascript),
            python: Arc::new(python),
            java: Arc::new(java),
            capabilities: Arc::new(capabilities),
            limits,
            permits,
        }
    }

    fn runtime_for(&self, language: Language) -> &Arc<dyn Runtime> {
        match language {
            Language::JavaScript => &self.javascript,
            Language::Python => &self.python,
            Language::Java => &self.java,
        }
    }

    /// Current (cached) toolchain availability
    pub async fn capabilities(&self) -> CapabilitySet {
        self.capabilities.capabilities().await
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Execute `source` as `language`, where `language` is a route segment.
    pub async fn execute_named(&self, language: &str, source: &str) -> SandboxResult<ExecutionResult> {
        let language = language.parse::<Language>()?;
        self.execute(ExecutionRequest::new(language, source)).await
    }

    /// Execute a request.
    ///
    /// `Err` only for client errors (missing code); every backend or
    /// infrastructure failure is folded into `Ok(ExecutionResult { success: false, .. })`.
    pub async fn execute(&self, request: ExecutionRequest) -> SandboxResult<ExecutionResult> {
        if !request.has_source() {
            return Err(SandboxError::MissingCode);
        }

        let id = Uuid::new_v4();
        let language = request.language;
        let runtime = self.runtime_for(language);

        tracing::info!(
            execution_id = %id,
            language = %language,
            runtime = runtime.name(),
            code_len = request.source.len(),
            "Executing code"
        );

        if language.requires_toolchain() {
            let toolchains = self.capabilities.toolchains().await;
            if !toolchains.capabilities().supports(language) {
                tracing::warn!(execution_id = %id, language = %language, ?toolchains, "Toolchain unavailable");
                return Ok(self.finish(
                    ExecutionResult::failed(runtime.missing_toolchain_message(&toolchains), ""),
                    0,
                ));
            }
        }

        let _permit = match &self.permits {
            Some(permits) => match permits.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return Ok(self.finish(
                        ExecutionResult::failed("Sandbox is shutting down", ""),
                        0,
                    ))
                }
            },
            None => None,
        };

        let start = Instant::now();
        let outcome = runtime.run(&request.source).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(execution_id = %id, language = %language, error = %e, "Sandbox failure");
                let message = e.to_string();
                ExecutionResult::failed(
                    if message.is_empty() { FALLBACK_ERROR.to_string() } else { message },
                    "",
                )
            }
        };

        tracing::info!(
            execution_id = %id,
            language = %language,
            success = result.success,
            timed_out = result.timed_out,
            duration_ms,
            "Execution finished"
        );

        Ok(self.finish(result, duration_ms))
    }

    fn finish(&self, mut result: ExecutionResult, duration_ms: u64) -> ExecutionResult {
        if !result.success && result.error_message.as_deref().map_or(true, str::is_empty) {
            result.error_message = Some(FALLBACK_ERROR.to_string());
        }
        result
            .with_duration_ms(duration_ms)
            .with_time_label(self.limits.time_label())
    }
}
