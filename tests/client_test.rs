mod common;

use std::time::Duration;

use jsonwebtoken::{decode, get_current_timestamp, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{
    client_config, read_body, router, start_http_server, start_https_server, start_socket_server,
    start_stalling_server, SECRET,
};
use gitlab_shell_client::{ApiClient, ApiError, CallContext, CancelReason, RequestMetadata};

fn no_meta() -> RequestMetadata {
    RequestMetadata::new()
}

async fn get_body(client: &ApiClient, path: &str) -> String {
    let response = client
        .get(&CallContext::new(), &no_meta(), path)
        .await
        .unwrap();
    read_body(response).await
}

#[tokio::test]
async fn test_hello_over_unix_socket() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    assert_eq!(get_body(&client, "/hello").await, "Hello");
}

#[tokio::test]
async fn test_hello_over_http() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    assert_eq!(get_body(&client, "/hello").await, "Hello");
}

#[tokio::test]
async fn test_hello_over_https_with_custom_ca() {
    let server = start_https_server(router("")).await;
    let mut config = client_config(&server.url, "");
    config.http_settings.ca_file = Some(server.ca_file.path().to_path_buf());
    let client = ApiClient::new(&config).unwrap();

    assert_eq!(get_body(&client, "/hello").await, "Hello");
}

#[tokio::test]
async fn test_https_rejects_untrusted_server() {
    let server = start_https_server(router("")).await;
    let other = start_https_server(router("")).await;

    // Trust a different certificate than the one the server presents.
    let mut config = client_config(&server.url, "");
    config.http_settings.ca_file = Some(other.ca_file.path().to_path_buf());
    let client = ApiClient::new(&config).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unreachable));
}

#[tokio::test]
async fn test_relative_url_roots() {
    for root in ["", "/", "/gitlab", "gitlab/"] {
        let url = start_http_server(router(root)).await;
        let client = ApiClient::new(&client_config(&url, root)).unwrap();
        assert_eq!(get_body(&client, "/hello").await, "Hello", "root {:?}", root);
    }

    for root in ["/", "/gitlab"] {
        let socket = start_socket_server(router(root)).await;
        let client = ApiClient::new(&client_config(&socket.gitlab_url(), root)).unwrap();
        assert_eq!(get_body(&client, "/hello").await, "Hello", "root {:?}", root);
    }
}

#[tokio::test]
async fn test_relative_url_root_is_required_when_mounted() {
    let url = start_http_server(router("/gitlab")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/hello")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal API error (404)");
}

#[tokio::test]
async fn test_trailing_slash_in_address() {
    let url = start_http_server(router("/gitlab")).await;
    let client = ApiClient::new(&client_config(&format!("{}/", url), "/gitlab/")).unwrap();

    assert_eq!(get_body(&client, "/hello").await, "Hello");
}

#[tokio::test]
async fn test_prefixed_path_is_not_doubled() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    assert_eq!(get_body(&client, "/api/v4/internal/hello").await, "Hello");
    assert_eq!(get_body(&client, "hello").await, "Hello");
}

#[tokio::test]
async fn test_post_echoes_serialized_json() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let response = client
        .post(
            &CallContext::new(),
            &no_meta(),
            "/post_endpoint",
            &json!({ "key": "value" }),
        )
        .await
        .unwrap();
    assert_eq!(read_body(response).await, r#"Echo: {"key":"value"}"#);

    let response = client
        .post(&CallContext::new(), &no_meta(), "/content_type", &json!({}))
        .await
        .unwrap();
    assert_eq!(read_body(response).await, "application/json");
}

#[tokio::test]
async fn test_missing_route_reports_status() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/missing")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal API error (404)");
}

#[tokio::test]
async fn test_error_message_is_surfaced() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/error")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Message(_)));
    assert_eq!(err.to_string(), "Don't do that");
}

#[tokio::test]
async fn test_broken_connection_is_unreachable() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/broken")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal API unreachable");
}

#[tokio::test]
async fn test_missing_socket_is_unreachable() {
    let socket = common::TestSocketDir::new();
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let err = client
        .get(&CallContext::new(), &no_meta(), "/hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unreachable));
}

#[tokio::test]
async fn test_static_secret_header() {
    let url = start_http_server(router("")).await;

    let client = ApiClient::new(&client_config(&url, "")).unwrap();
    assert_eq!(get_body(&client, "/auth").await, SECRET);

    let mut config = client_config(&url, "");
    config.secret = format!("\n{}\n", SECRET);
    let client = ApiClient::new(&config).unwrap();
    assert_eq!(get_body(&client, "/auth").await, SECRET);
}

#[tokio::test]
async fn test_static_secret_header_on_post() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let response = client
        .post(&CallContext::new(), &no_meta(), "/auth", &json!({}))
        .await
        .unwrap();
    assert_eq!(read_body(response).await, SECRET);
}

#[derive(Debug, Deserialize)]
struct Claims {
    iss: String,
    iat: u64,
    exp: u64,
}

fn assert_valid_token(token: &str) {
    let now = get_current_timestamp();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&["gitlab-shell"]);
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims;

    assert_eq!(claims.iss, "gitlab-shell");
    assert!(claims.iat.abs_diff(now) <= 1);
    assert_eq!(claims.exp, claims.iat + 60);
}

#[tokio::test]
async fn test_signed_token_header() {
    let url = start_http_server(router("")).await;
    let mut config = client_config(&url, "");
    config.secret = format!("\n{}\n", SECRET);
    let client = ApiClient::new(&config).unwrap();

    assert_valid_token(&get_body(&client, "/jwt_auth").await);

    let response = client
        .post(&CallContext::new(), &no_meta(), "/jwt_auth", &json!({ "key": "value" }))
        .await
        .unwrap();
    assert_valid_token(&read_body(response).await);
}

#[tokio::test]
async fn test_forwarded_for_header() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let meta = RequestMetadata::new().with_original_remote_ip("196.7.0.238");
    let response = client
        .get(&CallContext::new(), &meta, "/x_forwarded_for")
        .await
        .unwrap();
    assert_eq!(read_body(response).await, "196.7.0.238");

    assert_eq!(get_body(&client, "/x_forwarded_for").await, "");
}

#[tokio::test]
async fn test_unencodable_metadata_is_dropped() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let meta = RequestMetadata::new()
        .with_original_remote_ip("196.7.0.238\r\nX-Injected: 1")
        .with_correlation_id("bad\nid");

    let response = client
        .get(&CallContext::new(), &meta, "/x_forwarded_for")
        .await
        .unwrap();
    assert_eq!(read_body(response).await, "");

    let response = client
        .get(&CallContext::new(), &meta, "/correlation_id")
        .await
        .unwrap();
    assert_eq!(read_body(response).await, "");
}

#[tokio::test]
async fn test_correlation_id_and_user_agent() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let meta = RequestMetadata::new().with_correlation_id("01J0CORRELATION");
    let response = client
        .get(&CallContext::new(), &meta, "/correlation_id")
        .await
        .unwrap();
    assert_eq!(read_body(response).await, "01J0CORRELATION");

    assert_eq!(get_body(&client, "/user_agent").await, "GitLab-Shell");
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let first = get_body(&client, "/hello").await;
    for _ in 0..5 {
        assert_eq!(get_body(&client, "/hello").await, first);
    }
}

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { get_body(&client, "/hello").await })
        })
        .collect();

    for call in calls {
        assert_eq!(call.await.unwrap(), "Hello");
    }
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let url = start_http_server(router("")).await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let token = CancellationToken::new();
    let ctx = CallContext::with_cancellation(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.get(&ctx, &no_meta(), "/slow"),
    )
    .await
    .expect("cancellation must end the call promptly")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.to_string(), "Internal API request cancelled");
}

#[tokio::test]
async fn test_deadline_bounds_the_call() {
    let socket = start_socket_server(router("")).await;
    let client = ApiClient::new(&client_config(&socket.gitlab_url(), "")).unwrap();

    let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
    let err = client.get(&ctx, &no_meta(), "/slow").await.unwrap_err();

    assert!(matches!(err, ApiError::Cancelled(CancelReason::DeadlineExceeded)));
}

#[tokio::test]
async fn test_zero_read_timeout_falls_back_to_default() {
    let url = start_http_server(router("")).await;
    let mut config = client_config(&url, "");
    config.http_settings.read_timeout_secs = 0;
    let client = ApiClient::new(&config).unwrap();

    assert_eq!(get_body(&client, "/hello").await, "Hello");
}

#[tokio::test]
async fn test_cancellation_aborts_stalled_error_body() {
    let url = start_stalling_server().await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let token = CancellationToken::new();
    let ctx = CallContext::with_cancellation(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.get(&ctx, &no_meta(), "/error"),
    )
    .await
    .expect("cancellation must end the body read")
    .unwrap_err();

    assert!(matches!(err, ApiError::Cancelled(CancelReason::Cancelled)));
}

#[tokio::test]
async fn test_deadline_bounds_stalled_error_body() {
    let url = start_stalling_server().await;
    let client = ApiClient::new(&client_config(&url, "")).unwrap();

    let ctx = CallContext::new().with_timeout(Duration::from_millis(200));
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.get(&ctx, &no_meta(), "/error"),
    )
    .await
    .expect("deadline must end the body read")
    .unwrap_err();

    assert!(matches!(err, ApiError::Cancelled(CancelReason::DeadlineExceeded)));
}

#[tokio::test]
async fn test_stalled_error_body_falls_back_to_status() {
    let url = start_stalling_server().await;
    let mut config = client_config(&url, "");
    config.http_settings.read_timeout_secs = 1;
    let client = ApiClient::new(&config).unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.get(&CallContext::new(), &no_meta(), "/error"),
    )
    .await
    .expect("read timeout must end the body read")
    .unwrap_err();

    assert!(matches!(err, ApiError::Status(_)));
    assert_eq!(err.to_string(), "Internal API error (400)");
}
