//! TLS configuration and certificate loading.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use crate::config::HttpSettingsConfig;
use crate::error::ConfigurationError;

/// Protocol versions offered to the server; TLS 1.2 is the floor.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Trust and identity inputs for the TLS transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub ca_file: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl From<&HttpSettingsConfig> for TlsSettings {
    fn from(http: &HttpSettingsConfig) -> Self {
        Self {
            ca_file: http.ca_file.clone(),
            ca_path: http.ca_path.clone(),
            client_cert: http.client_cert.clone(),
            client_key: http.client_key.clone(),
        }
    }
}

/// Build the rustls client configuration for `https://` endpoints.
pub fn load_tls_config(settings: &TlsSettings) -> Result<Arc<ClientConfig>, ConfigurationError> {
    let roots = load_root_store(settings)?;

    let builder =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(roots);

    let config = match (&settings.client_cert, &settings.client_key) {
        (Some(cert_path), Some(key_path)) => {
            let chain = load_certificates(cert_path)?;
            let key = load_private_key(key_path)?;
            builder.with_client_auth_cert(chain, key)?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => return Err(ConfigurationError::IncompleteClientIdentity),
    };

    Ok(Arc::new(config))
}

/// Custom CA material replaces the platform roots entirely.
fn load_root_store(settings: &TlsSettings) -> Result<RootCertStore, ConfigurationError> {
    let mut roots = RootCertStore::empty();

    if settings.ca_file.is_none() && settings.ca_path.is_none() {
        let loaded = rustls_native_certs::load_native_certs();
        if !loaded.errors.is_empty() {
            tracing::warn!(
                error_count = loaded.errors.len(),
                "System root certificate loading returned partial errors"
            );
        }
        let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
        tracing::debug!(added, ignored, "Loaded system root certificates");
        return Ok(roots);
    }

    if let Some(ca_file) = &settings.ca_file {
        add_certificates(&mut roots, ca_file, load_certificates(ca_file)?)?;
    }

    if let Some(ca_path) = &settings.ca_path {
        let entries = fs::read_dir(ca_path).map_err(|source| ConfigurationError::ReadFile {
            path: ca_path.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| ConfigurationError::ReadFile {
                    path: ca_path.clone(),
                    source,
                })?
                .path();
            if !path.is_file() {
                continue;
            }
            // Directories of hashed links and other files are common; skip what isn't PEM.
            match load_certificates(&path) {
                Ok(certs) => add_certificates(&mut roots, &path, certs)?,
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping CA file"),
            }
        }
    }

    if roots.is_empty() {
        let path = settings
            .ca_file
            .clone()
            .or_else(|| settings.ca_path.clone())
            .unwrap_or_default();
        return Err(ConfigurationError::NoCertificates(path));
    }

    Ok(roots)
}

fn add_certificates(
    roots: &mut RootCertStore,
    path: &Path,
    certs: Vec<CertificateDer<'static>>,
) -> Result<(), ConfigurationError> {
    let (added, _ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(ConfigurationError::NoCertificates(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), added, "Loaded CA certificates");
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<fs::File>, ConfigurationError> {
    fs::File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConfigurationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Load every certificate from a PEM file.
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigurationError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigurationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(ConfigurationError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigurationError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| ConfigurationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ConfigurationError::NoPrivateKey(path.to_path_buf()))
}
