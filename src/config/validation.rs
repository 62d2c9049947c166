//! Configuration validation.
//!
//! Serde handles syntax; this checks meaning. Every problem is reported,
//! not just the first.

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::net::endpoint::Endpoint;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("gitlab_url is required")]
    MissingUrl,

    #[error("gitlab_url is invalid: {0}")]
    InvalidUrl(String),

    #[error("http_settings.read_timeout_secs must be greater than zero")]
    ZeroReadTimeout,

    #[error("retries.min_backoff_ms ({min}) exceeds retries.max_backoff_ms ({max})")]
    BackoffRange { min: u64, max: u64 },

    #[error("http_settings.client_cert and http_settings.client_key must be set together")]
    IncompleteClientIdentity,

    #[error("http_settings.password is set without http_settings.user")]
    PasswordWithoutUser,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.gitlab_url.trim().is_empty() {
        errors.push(ValidationError::MissingUrl);
    } else if let Err(e) = Endpoint::parse(&config.gitlab_url, &config.gitlab_relative_url_root) {
        errors.push(ValidationError::InvalidUrl(e.to_string()));
    }

    let http = &config.http_settings;
    if http.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroReadTimeout);
    }
    if http.client_cert.is_some() != http.client_key.is_some() {
        errors.push(ValidationError::IncompleteClientIdentity);
    }
    if http.password.is_some() && http.user.is_none() {
        errors.push(ValidationError::PasswordWithoutUser);
    }

    let retries = &config.retries;
    if retries.min_backoff_ms > retries.max_backoff_ms {
        errors.push(ValidationError::BackoffRange {
            min: retries.min_backoff_ms,
            max: retries.max_backoff_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
