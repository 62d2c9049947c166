//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read timeout used when none is configured.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Root configuration for the internal API client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Internal API address: `http://`, `https://` or `http+unix://<socket>`.
    pub gitlab_url: String,

    /// Path under which the API is mounted (e.g. "/gitlab").
    pub gitlab_relative_url_root: String,

    /// Shared secret. When empty, `secret_file` is read instead.
    pub secret: String,

    /// File holding the shared secret.
    pub secret_file: Option<PathBuf>,

    /// Transport settings.
    pub http_settings: HttpSettingsConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport settings for reaching the internal API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettingsConfig {
    /// Basic auth user.
    pub user: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Upper bound for a single attempt, in seconds. Zero means the default.
    pub read_timeout_secs: u64,

    /// PEM file with the certificate(s) to trust.
    pub ca_file: Option<PathBuf>,

    /// Directory of PEM files with certificates to trust.
    pub ca_path: Option<PathBuf>,

    /// Client certificate chain (PEM) for mutual TLS.
    pub client_cert: Option<PathBuf>,

    /// Client private key (PEM) for mutual TLS.
    pub client_key: Option<PathBuf>,
}

impl HttpSettingsConfig {
    pub fn read_timeout(&self) -> Duration {
        match self.read_timeout_secs {
            0 => Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

impl Default for HttpSettingsConfig {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            ca_file: None,
            ca_path: None,
            client_cert: None,
            client_key: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Lower bound for the wait between attempts in milliseconds.
    pub min_backoff_ms: u64,

    /// Upper bound for the wait between attempts in milliseconds.
    pub max_backoff_ms: u64,

    /// Additional attempts after the first one.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 1000,
            max_backoff_ms: 15_000,
            max_retries: 2,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
