//! Transport construction.
//!
//! # Responsibilities
//! - Dial the unix socket for `http+unix://` endpoints, ignoring the URI authority
//! - Dial TCP for `http://` and `https://` endpoints
//! - Run the TLS handshake for `https://` with the configured trust roots
//!
//! The connector plugs into the hyper-util pooled client, so connections are
//! reused across requests and the client can be shared between tasks.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower::{Service, ServiceExt};

use crate::error::ConfigurationError;
use crate::net::endpoint::{Endpoint, EndpointKind};
use crate::net::tls::{load_tls_config, TlsSettings};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dials connections to the internal API.
#[derive(Clone)]
pub enum ApiConnector {
    /// Every connection goes to the same socket.
    Unix { socket_path: Arc<PathBuf> },
    /// TCP, with TLS for `https` URIs.
    Tcp {
        http: HttpConnector,
        tls: Option<TlsConnector>,
    },
}

impl ApiConnector {
    /// Build the connector matching an endpoint.
    ///
    /// TLS material is only loaded for `https://` endpoints. A socket that
    /// does not exist is reported when a request is made, not here.
    pub fn for_endpoint(endpoint: &Endpoint, tls: &TlsSettings) -> Result<Self, ConfigurationError> {
        match endpoint.kind() {
            EndpointKind::Unix { socket_path } => Ok(Self::unix(socket_path.clone())),
            EndpointKind::Http => Ok(Self::tcp(None)),
            EndpointKind::Https => {
                let config = load_tls_config(tls)?;
                Ok(Self::tcp(Some(TlsConnector::from(config))))
            }
        }
    }

    pub fn unix(socket_path: PathBuf) -> Self {
        Self::Unix {
            socket_path: Arc::new(socket_path),
        }
    }

    pub fn tcp(tls: Option<TlsConnector>) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        Self::Tcp { http, tls }
    }

    async fn connect(self, uri: Uri) -> Result<ApiIo, BoxError> {
        let stream = match self {
            Self::Unix { socket_path } => {
                let stream = UnixStream::connect(socket_path.as_path()).await?;
                ApiStream::Unix(stream)
            }
            Self::Tcp { http, tls } => {
                let tcp = http.oneshot(uri.clone()).await?.into_inner();
                if uri.scheme_str() != Some("https") {
                    ApiStream::Tcp(tcp)
                } else {
                    let tls = tls.ok_or_else(|| {
                        io::Error::new(io::ErrorKind::Unsupported, "TLS is not configured")
                    })?;
                    let host = uri
                        .host()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing host"))?
                        .trim_start_matches('[')
                        .trim_end_matches(']');
                    let server_name = ServerName::try_from(host.to_string())?;
                    let stream = tls.connect(server_name, tcp).await?;
                    ApiStream::Tls(Box::new(stream))
                }
            }
        };

        Ok(ApiIo {
            inner: TokioIo::new(stream),
        })
    }
}

impl Service<Uri> for ApiConnector {
    type Response = ApiIo;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<ApiIo, BoxError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        Box::pin(self.clone().connect(uri))
    }
}

/// A connected byte stream, whichever transport produced it.
pub enum ApiStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Unix(UnixStream),
}

impl AsyncRead for ApiStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            Self::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ApiStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            Self::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            Self::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            Self::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Adapts `ApiStream` to hyper's I/O traits.
pub struct ApiIo {
    inner: TokioIo<ApiStream>,
}

impl hyper::rt::Read for ApiIo {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.inner), cx, buf)
    }
}

impl hyper::rt::Write for ApiIo {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.inner), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.inner), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.inner), cx)
    }
}

impl Connection for ApiIo {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}
