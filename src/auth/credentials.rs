//! Shared secret handling.

use std::fmt;
use std::path::Path;

use http::HeaderValue;
use jsonwebtoken::EncodingKey;

use crate::config::ClientConfig;
use crate::error::ConfigurationError;

/// The trimmed shared secret, in the two forms requests need it.
#[derive(Clone)]
pub struct Credentials {
    header_value: HeaderValue,
    signing_key: EncodingKey,
}

impl Credentials {
    /// Trim surrounding whitespace and precompute both uses of the secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigurationError> {
        let secret = secret.as_ref().trim_ascii();

        let mut header_value =
            HeaderValue::from_bytes(secret).map_err(|_| ConfigurationError::InvalidSecret)?;
        header_value.set_sensitive(true);

        Ok(Self {
            header_value,
            signing_key: EncodingKey::from_secret(secret),
        })
    }

    /// Use `secret`, or the contents of `secret_file` when `secret` is empty.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigurationError> {
        match &config.secret_file {
            Some(path) if config.secret.trim().is_empty() => Self::from_file(path),
            _ => Self::new(&config.secret),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let secret = std::fs::read(path).map_err(|source| ConfigurationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(secret)
    }

    /// Value of the static secret header.
    pub fn header_value(&self) -> &HeaderValue {
        &self.header_value
    }

    pub(crate) fn signing_key(&self) -> &EncodingKey {
        &self.signing_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}
