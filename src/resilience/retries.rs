//! Retry logic.
//!
//! # Responsibilities
//! - Replay a prepared request while attempts fail with 5xx or transport errors
//! - Sleep with exponential backoff and jitter between attempts
//! - Stop as soon as the call context is cancelled or its deadline passes
//!
//! # Design Decisions
//! - 4xx responses are terminal and returned on the first attempt
//! - Every method is retried; the internal API treats these calls as idempotent
//! - Implemented as a tower `Layer` so the transport stays single-attempt

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Response;
use thiserror::Error;
use tower::{Layer, Service, ServiceExt};

use crate::config::RetryConfig;
use crate::error::CancelReason;
use crate::http::request::ApiRequest;
use crate::http::transport::TransportError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    min_backoff: Duration,
    max_backoff: Duration,
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(min_backoff: Duration, max_backoff: Duration, max_retries: u32) -> Self {
        Self {
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
            max_retries,
        }
    }

    /// Total attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the attempt following `failed_attempts` failures.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        calculate_backoff(failed_attempts, self.min_backoff, self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.max_retries,
        )
    }
}

impl<S> Layer<S> for RetryPolicy {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            policy: *self,
        }
    }
}

/// Why a retried call produced no terminal response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// An attempt failed in a way another attempt cannot fix.
    #[error(transparent)]
    Terminal(TransportError),

    /// The call context ended.
    #[error(transparent)]
    Cancelled(CancelReason),
}

/// Retrying wrapper around a single-attempt service.
#[derive(Debug, Clone)]
pub struct Retry<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retry<S> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S, B> Service<ApiRequest> for Retry<S>
where
    S: Service<ApiRequest, Response = Response<B>, Error = TransportError> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = Response<B>;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<B>, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let inner = self.inner.clone();
        let policy = self.policy;
        Box::pin(run(inner, policy, request))
    }
}

async fn run<S, B>(
    mut inner: S,
    policy: RetryPolicy,
    request: ApiRequest,
) -> Result<Response<B>, DispatchError>
where
    S: Service<ApiRequest, Response = Response<B>, Error = TransportError>,
{
    let ctx = request.context().clone();
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        ctx.check().map_err(DispatchError::Cancelled)?;
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            reason = ctx.done() => return Err(DispatchError::Cancelled(reason)),
            outcome = async {
                inner.ready().await?.call(request.clone()).await
            } => outcome,
        };

        let reason = match outcome {
            Ok(response) if !response.status().is_server_error() => return Ok(response),
            Ok(response) => {
                tracing::debug!(
                    uri = %request.uri(),
                    attempt,
                    status = response.status().as_u16(),
                    "Internal API answered with server error"
                );
                "status"
            }
            Err(err) if err.is_retryable() => {
                tracing::debug!(
                    uri = %request.uri(),
                    attempt,
                    error = %err,
                    "Internal API attempt failed"
                );
                "transport"
            }
            Err(err) => return Err(DispatchError::Terminal(err)),
        };

        if attempt >= max_attempts {
            tracing::debug!(
                uri = %request.uri(),
                attempts = attempt,
                "Internal API retries exhausted"
            );
            return Err(DispatchError::Exhausted { attempts: attempt });
        }

        let delay = policy.backoff(attempt);
        tracing::debug!(
            uri = %request.uri(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying internal API request"
        );
        metrics::record_retry(reason);

        tokio::select! {
            biased;
            reason = ctx.done() => return Err(DispatchError::Cancelled(reason)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
