//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! secret (config or secret_file)
//!     → credentials.rs (trim, static header value, signing key)
//!     → token.rs (fresh signed token per call)
//!     → Authenticator writes both headers, plus basic auth when configured
//! ```

pub mod credentials;
pub mod token;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};

use crate::config::ClientConfig;
use crate::error::ConfigurationError;
use crate::http::headers::HeaderRole;

pub use credentials::Credentials;

/// Attaches authentication headers to outgoing requests.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Credentials,
    basic_auth: Option<HeaderValue>,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            basic_auth: None,
        }
    }

    /// Build from the secret and optional basic auth settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigurationError> {
        let mut authenticator = Self::new(Credentials::from_config(config)?);
        if let Some(user) = &config.http_settings.user {
            let password = config.http_settings.password.as_deref().unwrap_or_default();
            authenticator = authenticator.with_basic_auth(user, password)?;
        }
        Ok(authenticator)
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Result<Self, ConfigurationError> {
        let encoded = STANDARD.encode(format!("{}:{}", user, password));
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|_| ConfigurationError::InvalidBasicAuth)?;
        value.set_sensitive(true);
        self.basic_auth = Some(value);
        Ok(self)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Write the static secret, a freshly signed token and basic auth.
    pub fn authenticate(&self, headers: &mut HeaderMap) -> Result<(), jsonwebtoken::errors::Error> {
        let token = token::sign(&self.credentials)?;
        // JWTs are base64url segments joined by dots, always a valid header value.
        let mut token = HeaderValue::from_maybe_shared(bytes::Bytes::from(token))
            .map_err(|_| jsonwebtoken::errors::ErrorKind::InvalidToken)?;
        token.set_sensitive(true);

        headers.insert(
            HeaderRole::StaticSecret.name(),
            self.credentials.header_value().clone(),
        );
        headers.insert(HeaderRole::SignedToken.name(), token);
        if let Some(basic_auth) = &self.basic_auth {
            headers.insert(AUTHORIZATION, basic_auth.clone());
        }
        Ok(())
    }
}
