//! Request executor.
//!
//! # Responsibilities
//! - Resolve the request URI and attach forwarding, correlation and auth headers
//! - Dispatch through the retrying transport
//! - Classify the terminal outcome and record call metrics
//!
//! Reading a non-2xx body for its error message is bounded by the call
//! context and by the read timeout, same as the attempts before it.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use http::{HeaderValue, Method, Response};
use hyper::body::Incoming;
use serde::Serialize;
use tower::{Layer, Service, ServiceExt};

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::context::{CallContext, RequestMetadata};
use crate::error::{ApiError, ApiResult, ConfigurationError};
use crate::http::headers::{user_agent, HeaderRole};
use crate::http::request::ApiRequest;
use crate::http::response::classify;
use crate::http::transport::Transport;
use crate::net::{ApiConnector, Endpoint, TlsSettings};
use crate::observability::metrics;
use crate::resilience::{Retry, RetryPolicy};

/// Client for the internal API.
///
/// Cheap to clone; clones share the connection pool and credentials.
#[derive(Clone)]
pub struct ApiClient {
    endpoint: Arc<Endpoint>,
    authenticator: Authenticator,
    service: Retry<Transport>,
    read_timeout: Duration,
}

impl ApiClient {
    /// Build a client. Fails on a malformed address, unusable TLS material
    /// or an unusable secret; never dials.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigurationError> {
        let endpoint = Endpoint::parse(&config.gitlab_url, &config.gitlab_relative_url_root)?;
        let connector = ApiConnector::for_endpoint(&endpoint, &TlsSettings::from(&config.http_settings))?;
        let read_timeout = config.http_settings.read_timeout();
        let transport = Transport::new(connector, read_timeout);
        let service = RetryPolicy::from(&config.retries).layer(transport);
        let authenticator = Authenticator::from_config(config)?;

        tracing::debug!(
            gitlab_url = %config.gitlab_url,
            relative_url_root = %endpoint.relative_url_root(),
            max_retries = config.retries.max_retries,
            "Internal API client created"
        );

        Ok(Self {
            endpoint: Arc::new(endpoint),
            authenticator,
            service,
            read_timeout,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// GET `path` under the internal API prefix.
    pub async fn get(
        &self,
        ctx: &CallContext,
        meta: &RequestMetadata,
        path: &str,
    ) -> ApiResult<Response<Incoming>> {
        self.execute(ctx, meta, Method::GET, path, None).await
    }

    /// POST `body` as JSON to `path` under the internal API prefix.
    pub async fn post<T>(
        &self,
        ctx: &CallContext,
        meta: &RequestMetadata,
        path: &str,
        body: &T,
    ) -> ApiResult<Response<Incoming>>
    where
        T: Serialize + ?Sized,
    {
        let start_time = Instant::now();
        let body = match serde_json::to_vec(body) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                metrics::record_request(Method::POST.as_str(), "invalid", start_time);
                return Err(err.into());
            }
        };
        self.execute(ctx, meta, Method::POST, path, Some(body)).await
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        meta: &RequestMetadata,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> ApiResult<Response<Incoming>> {
        let start_time = Instant::now();
        let method_label = method.clone();

        let result = self.dispatch(ctx, meta, method, path, body).await;

        metrics::record_request(method_label.as_str(), outcome(&result), start_time);
        result
    }

    async fn dispatch(
        &self,
        ctx: &CallContext,
        meta: &RequestMetadata,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> ApiResult<Response<Incoming>> {
        let uri = self.endpoint.url_for(path)?;
        let mut request = ApiRequest::new(method, uri, ctx.clone());

        let headers = request.headers_mut();
        headers.insert(USER_AGENT, user_agent());
        if let Some(ip) = meta.original_remote_ip() {
            match HeaderValue::from_str(ip) {
                Ok(value) => {
                    headers.insert(HeaderRole::ForwardedFor.name(), value);
                }
                Err(e) => tracing::debug!(
                    header = %HeaderRole::ForwardedFor.name(),
                    error = %e,
                    "Dropping original remote IP that is not a valid header value"
                ),
            }
        }
        if let Some(id) = meta.correlation_id() {
            match HeaderValue::from_str(id) {
                Ok(value) => {
                    headers.insert(HeaderRole::CorrelationId.name(), value);
                }
                Err(e) => tracing::debug!(
                    header = %HeaderRole::CorrelationId.name(),
                    error = %e,
                    "Dropping correlation ID that is not a valid header value"
                ),
            }
        }
        if let Some(body) = &body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        self.authenticator.authenticate(headers)?;

        if let Some(body) = body {
            request = request.with_body(body);
        }

        let mut service = self.service.clone();
        let response = service.ready().await?.call(request).await?;
        let status = response.status();

        // A stalled error body degrades to the bare status.
        tokio::select! {
            biased;
            result = tokio::time::timeout(self.read_timeout, classify(response)) => match result {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(status = status.as_u16(), "Timed out reading error body");
                    Err(ApiError::Status(status))
                }
            },
            reason = ctx.done() => Err(ApiError::Cancelled(reason)),
        }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .field("retry", self.service.policy())
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

fn outcome(result: &ApiResult<Response<Incoming>>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ApiError::Message(_)) | Err(ApiError::Status(_)) => "error_status",
        Err(ApiError::Unreachable) => "unreachable",
        Err(ApiError::Cancelled(_)) => "cancelled",
        Err(_) => "invalid",
    }
}
