//! Shared test servers for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};

use gitlab_shell_client::config::{ClientConfig, RetryConfig};

pub const SECRET: &str = "sssh, it's a secret";

/// A private directory holding one socket path, removed on drop.
pub struct TestSocketDir {
    _dir: TempDir,
    socket_path: PathBuf,
}

impl TestSocketDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("internal.sock");
        Self {
            _dir: dir,
            socket_path,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn gitlab_url(&self) -> String {
        format!("http+unix://{}", self.socket_path.display())
    }
}

fn header_or_empty(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// Kills the connection task before any response is written.
async fn broken() -> &'static str {
    panic!("Broken")
}

async fn shared_secret(headers: HeaderMap) -> String {
    header_or_empty(&headers, "Gitlab-Shared-Secret")
}

async fn signed_token(headers: HeaderMap) -> String {
    header_or_empty(&headers, "Gitlab-Shell-Api-Request")
}

fn internal_routes() -> Router {
    Router::new()
        .route("/hello", get(|| async { "Hello" }))
        .route(
            "/post_endpoint",
            post(|body: String| async move { format!("Echo: {}", body) }),
        )
        .route("/auth", get(shared_secret).post(shared_secret))
        .route("/jwt_auth", get(signed_token).post(signed_token))
        .route(
            "/x_forwarded_for",
            get(|headers: HeaderMap| async move { header_or_empty(&headers, "X-Forwarded-For") }),
        )
        .route(
            "/correlation_id",
            get(|headers: HeaderMap| async move { header_or_empty(&headers, "X-Request-Id") }),
        )
        .route(
            "/user_agent",
            get(|headers: HeaderMap| async move { header_or_empty(&headers, "User-Agent") }),
        )
        .route(
            "/content_type",
            post(|headers: HeaderMap| async move { header_or_empty(&headers, "Content-Type") }),
        )
        .route(
            "/error",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": "Don't do that" })),
                )
            }),
        )
        .route("/broken", get(broken))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "Too late"
            }),
        )
}

/// Routes mounted under `<root>/api/v4/internal`.
pub fn router(relative_url_root: &str) -> Router {
    let root = relative_url_root.trim_matches('/');
    let prefix = if root.is_empty() {
        "/api/v4/internal".to_string()
    } else {
        format!("/{}/api/v4/internal", root)
    };
    Router::new().nest(&prefix, internal_routes())
}

/// Attempt counters for `retry_router`.
#[derive(Clone, Default)]
pub struct Attempts {
    pub flaky: Arc<AtomicU32>,
    pub failing: Arc<AtomicU32>,
    pub rejected: Arc<AtomicU32>,
    pub broken: Arc<AtomicU32>,
}

impl Attempts {
    pub fn flaky(&self) -> u32 {
        self.flaky.load(Ordering::SeqCst)
    }

    pub fn failing(&self) -> u32 {
        self.failing.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn broken(&self) -> u32 {
        self.broken.load(Ordering::SeqCst)
    }
}

/// `/flaky` fails twice then succeeds, `/failing` always fails, `/rejected`
/// always answers 403 and `/broken` drops the connection.
pub fn retry_router(attempts: Attempts) -> Router {
    let flaky = attempts.flaky.clone();
    let failing = attempts.failing.clone();
    let rejected = attempts.rejected.clone();
    let broken_calls = attempts.broken.clone();

    let routes = Router::new()
        .route(
            "/flaky",
            get(move || {
                let n = flaky.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Not yet")
                    } else {
                        (StatusCode::OK, "Hello")
                    }
                }
            }),
        )
        .route(
            "/failing",
            get(move || {
                failing.fetch_add(1, Ordering::SeqCst);
                async { (StatusCode::SERVICE_UNAVAILABLE, "Down") }
            }),
        )
        .route(
            "/rejected",
            get(move || {
                rejected.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::FORBIDDEN }
            }),
        )
        .route(
            "/broken",
            get(move || {
                broken_calls.fetch_add(1, Ordering::SeqCst);
                broken()
            }),
        );

    Router::new().nest("/api/v4/internal", routes)
}

/// Serve `router` on a unix socket.
pub async fn start_socket_server(router: Router) -> TestSocketDir {
    let socket_dir = TestSocketDir::new();
    let listener = UnixListener::bind(socket_dir.socket_path()).unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    socket_dir
}

/// Serve `router` over plain HTTP; returns the base URL.
pub async fn start_http_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Accept connections, answer each with a 400 head and a truncated body,
/// then hold the connection open without finishing it. Returns the base URL.
pub async fn start_stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 400 Bad Request\r\n\
                          Content-Type: application/json\r\n\
                          Content-Length: 100\r\n\r\n\
                          {\"mess",
                    )
                    .await;
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(stream);
            });
        }
    });
    format!("http://{}", addr)
}

/// A TLS server and the CA file that trusts it.
pub struct TlsServer {
    pub url: String,
    pub ca_file: NamedTempFile,
    handle: axum_server::Handle,
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

/// Serve `router` over HTTPS with a fresh self-signed certificate for `localhost`.
pub async fn start_https_server(router: Router) -> TlsServer {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = cert.pem();

    let config = RustlsConfig::from_pem(
        cert_pem.clone().into_bytes(),
        signing_key.serialize_pem().into_bytes(),
    )
    .await
    .unwrap();

    let handle = axum_server::Handle::new();
    let server_handle = handle.clone();
    tokio::spawn(async move {
        axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), config)
            .handle(server_handle)
            .serve(router.into_make_service())
            .await
            .unwrap();
    });
    let addr = handle.listening().await.unwrap();

    let ca_file = NamedTempFile::new().unwrap();
    std::fs::write(ca_file.path(), cert_pem).unwrap();

    TlsServer {
        url: format!("https://localhost:{}", addr.port()),
        ca_file,
        handle,
    }
}

/// Client configuration with millisecond backoff.
pub fn client_config(gitlab_url: &str, relative_url_root: &str) -> ClientConfig {
    ClientConfig {
        gitlab_url: gitlab_url.to_string(),
        gitlab_relative_url_root: relative_url_root.to_string(),
        secret: SECRET.to_string(),
        retries: RetryConfig {
            min_backoff_ms: 1,
            max_backoff_ms: 1,
            max_retries: 2,
        },
        ..Default::default()
    }
}

pub async fn read_body(response: http::Response<Incoming>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
