//! Error taxonomy for the internal API client.
//!
//! Two layers:
//! - `ConfigurationError`: raised while building a client, never retried
//! - `ApiError`: the single value a call returns once retries are exhausted
//!
//! The `Display` text of `Unreachable`, `Status` and `Message` is part of the
//! contract with the command layer, which matches on it.

use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// Problems detected while constructing a client.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The address does not start with a recognized scheme.
    #[error("unknown GitLab URL prefix: {0}")]
    UnsupportedAddress(String),

    /// The address has a recognized scheme but cannot be used.
    #[error("invalid GitLab URL '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A file referenced by the configuration could not be read.
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PEM file that should hold certificates holds none.
    #[error("no certificates found in '{0}'")]
    NoCertificates(PathBuf),

    /// A PEM file that should hold a private key holds none.
    #[error("no private key found in '{0}'")]
    NoPrivateKey(PathBuf),

    /// Only one half of the client certificate/key pair was configured.
    #[error("client certificate and client key must be configured together")]
    IncompleteClientIdentity,

    /// rustls rejected the assembled TLS configuration.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// The shared secret cannot be sent as a header value.
    #[error("shared secret contains characters not allowed in a header")]
    InvalidSecret,

    /// The basic auth credentials cannot be sent as a header value.
    #[error("basic auth credentials contain characters not allowed in a header")]
    InvalidBasicAuth,
}

/// Why a call ended before reaching a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The caller cancelled the context.
    #[error("Internal API request cancelled")]
    Cancelled,

    /// The context deadline passed.
    #[error("Internal API request deadline exceeded")]
    DeadlineExceeded,
}

/// Errors returned by `ApiClient` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The request path could not be turned into a URI.
    #[error("invalid request path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The POST body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The per-request token could not be signed.
    #[error("failed to sign request token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// No attempt produced a usable HTTP exchange.
    #[error("Internal API unreachable")]
    Unreachable,

    /// Terminal non-2xx response without a usable message.
    #[error("Internal API error ({})", .0.as_u16())]
    Status(StatusCode),

    /// Terminal non-2xx response whose JSON body carried a message.
    #[error("{0}")]
    Message(String),

    /// The call context ended first.
    #[error(transparent)]
    Cancelled(#[from] CancelReason),
}

impl ApiError {
    /// True when the call was cut short by the caller rather than the API.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled(_))
    }

    /// Status of the terminal response, if the API answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// Result type for internal API calls.
pub type ApiResult<T> = Result<T, ApiError>;
