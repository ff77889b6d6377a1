//! Server configuration
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables (after `.env` has been loaded).

use mitra_sandbox::{ResourceLimits, SandboxConfig, ScratchRoot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// HTTP listener and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// "pretty" or "json"
    pub log_format: String,
    /// Allowed browser origin; any origin when unset
    pub cors_origin: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Scratch directory; `<tmp>/mitra-scratch` when unset
    pub scratch_dir: Option<PathBuf>,
    pub timeout_secs: f64,
    pub probe_timeout_secs: f64,
    pub capability_ttl_secs: u64,
    /// 0 disables the ceiling
    pub max_concurrent: usize,
    pub max_heap_mb: usize,
    pub python_bin: String,
    pub javac_bin: String,
    pub java_bin: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let limits = ResourceLimits::default();
        Self {
            scratch_dir: None,
            timeout_secs: limits.max_duration.as_secs_f64(),
            probe_timeout_secs: limits.probe_timeout.as_secs_f64(),
            capability_ttl_secs: 60,
            max_concurrent: limits.max_concurrent.unwrap_or(0),
            max_heap_mb: limits.max_heap_bytes / (1024 * 1024),
            python_bin: "python3".to_string(),
            javac_bin: "javac".to_string(),
            java_bin: "java".to_string(),
        }
    }
}

/// Accepted V8 heap ceilings, in MiB
const HEAP_MB_RANGE: std::ops::RangeInclusive<usize> = 16..=4096;

/// A strictly positive, finite number of seconds that fits a `Duration`
fn positive_secs(key: &str, secs: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::Invalid(format!(
            "{key} must be a positive number of seconds, got {secs}"
        ))),
    }
}

impl SandboxSettings {
    pub fn to_sandbox_config(&self) -> Result<SandboxConfig, ConfigError> {
        if !HEAP_MB_RANGE.contains(&self.max_heap_mb) {
            return Err(ConfigError::Invalid(format!(
                "sandbox.max_heap_mb must be between {} and {}, got {}",
                HEAP_MB_RANGE.start(),
                HEAP_MB_RANGE.end(),
                self.max_heap_mb
            )));
        }

        let scratch_root = match &self.scratch_dir {
            Some(dir) => ScratchRoot::new(dir),
            None => ScratchRoot::in_temp_dir(),
        };

        Ok(SandboxConfig {
            scratch_root,
            limits: ResourceLimits {
                max_duration: positive_secs("sandbox.timeout_secs", self.timeout_secs)?,
                probe_timeout: positive_secs("sandbox.probe_timeout_secs", self.probe_timeout_secs)?,
                max_heap_bytes: self.max_heap_mb * 1024 * 1024,
                max_concurrent: (self.max_concurrent > 0).then_some(self.max_concurrent),
            },
            capability_ttl: Duration::from_secs(self.capability_ttl_secs),
            python_bin: self.python_bin.clone(),
            javac_bin: self.javac_bin.clone(),
            java_bin: self.java_bin.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer
    pub jwt_secret: String,
}

/// Global fixed-window ceiling on the execution routes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    /// Tried in order until one answers
    pub models: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            models: vec![
                "gemini-1.5-flash-latest".to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro-latest".to_string(),
            ],
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load from `path` (defaults when `None` or missing), then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.server.cors_origin = Some(origin).filter(|o| !o.is_empty());
        }
        if let Some(dir) = lookup("MITRA_SCRATCH_DIR") {
            self.sandbox.scratch_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "JWT_SECRET must be set (auth.jwt_secret)".to_string(),
            ));
        }
        self.sandbox.to_sandbox_config()?;
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_secs and rate_limit.max_requests must be positive".to_string(),
            ));
        }
        if self.llm.models.is_empty() {
            return Err(ConfigError::Invalid("llm.models must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
