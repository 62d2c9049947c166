//! Single-attempt transport.
//!
//! # Responsibilities
//! - Send one attempt of an `ApiRequest` through the pooled hyper client
//! - Bound the attempt by the configured read timeout
//! - Tell retryable failures apart from ones the client caused itself

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tower::Service;

use crate::http::request::ApiRequest;
use crate::net::ApiConnector;

/// Failure of a single attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting, writing or reading failed.
    #[error("request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),

    /// No response head arrived within the read timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether another attempt could succeed.
    ///
    /// Everything is retryable except hyper "user" errors, which stem from
    /// a request the client itself framed incorrectly.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Http(err) => !caused_by_user(err),
        }
    }
}

fn caused_by_user(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_user() {
                return true;
            }
        }
        current = err.source();
    }
    false
}

/// The network transport, shared by every call on a client.
#[derive(Clone)]
pub struct Transport {
    client: Client<ApiConnector, Full<Bytes>>,
    read_timeout: Duration,
}

impl Transport {
    pub fn new(connector: ApiConnector, read_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            read_timeout,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Service<ApiRequest> for Transport {
    type Response = Response<Incoming>;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Incoming>, TransportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let client = self.client.clone();
        let read_timeout = self.read_timeout;

        Box::pin(async move {
            match tokio::time::timeout(read_timeout, client.request(request.to_http())).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(TransportError::Timeout(read_timeout)),
            }
        })
    }
}
