//! Endpoint resolution.
//!
//! Turns the configured address and relative URL root into a base URL, and
//! a caller path into a full request URI under the internal API prefix.

use std::path::PathBuf;

use http::Uri;

use crate::error::{ApiError, ConfigurationError};

/// Prefix every internal API route lives under.
pub const INTERNAL_API_PATH: &str = "/api/v4/internal";

const UNIX_SOCKET_SCHEME: &str = "http+unix://";
const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";

/// Nominal base for socket requests; the connector ignores the authority.
const SOCKET_BASE_URL: &str = "http://unix";

/// How the internal API is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// HTTP over a unix-domain socket.
    Unix { socket_path: PathBuf },
    /// Plain HTTP over TCP.
    Http,
    /// HTTP over TLS.
    Https,
}

/// A parsed and normalized internal API address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    kind: EndpointKind,
    /// Scheme, authority and any path, without a trailing slash.
    host: String,
    /// Relative URL root without leading or trailing slashes.
    relative_url_root: String,
}

impl Endpoint {
    /// Parse a configured address.
    pub fn parse(address: &str, relative_url_root: &str) -> Result<Self, ConfigurationError> {
        let address = address.trim();
        let relative_url_root = relative_url_root.trim().trim_matches('/').to_string();

        if let Some(socket_path) = address.strip_prefix(UNIX_SOCKET_SCHEME) {
            if socket_path.is_empty() {
                return Err(ConfigurationError::InvalidAddress {
                    address: address.to_string(),
                    reason: "socket path is empty".to_string(),
                });
            }
            return Ok(Self {
                kind: EndpointKind::Unix {
                    socket_path: PathBuf::from(socket_path),
                },
                host: SOCKET_BASE_URL.to_string(),
                relative_url_root,
            });
        }

        let kind = if address.starts_with(HTTP_SCHEME) {
            EndpointKind::Http
        } else if address.starts_with(HTTPS_SCHEME) {
            EndpointKind::Https
        } else {
            return Err(ConfigurationError::UnsupportedAddress(address.to_string()));
        };

        let parsed = url::Url::parse(address).map_err(|e| ConfigurationError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ConfigurationError::InvalidAddress {
                address: address.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            kind,
            host: address.trim_end_matches('/').to_string(),
            relative_url_root,
        })
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    /// Base URL requests are built on, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn relative_url_root(&self) -> &str {
        &self.relative_url_root
    }

    /// Build the full request URI for a caller path.
    pub fn url_for(&self, path: &str) -> Result<Uri, ApiError> {
        let mut url = String::with_capacity(self.host.len() + path.len() + 32);
        url.push_str(self.host.trim_end_matches('/'));
        if !self.relative_url_root.is_empty() {
            url.push('/');
            url.push_str(&self.relative_url_root);
        }
        url.push_str(&normalize_path(path));

        url.parse::<Uri>().map_err(|e| ApiError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Make `path` absolute and place it under the internal API prefix.
fn normalize_path(path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if path.starts_with(INTERNAL_API_PATH) {
        path
    } else {
        format!("{}{}", INTERNAL_API_PATH, path)
    }
}
