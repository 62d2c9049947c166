//! Per-call execution context and request metadata.
//!
//! `CallContext` carries cancellation and an optional deadline bounding the
//! whole call, retries included. `RequestMetadata` carries the side data the
//! command layer wants forwarded to the API. Both are read-only to the client.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CancelReason;

/// Cancellation and deadline for one call.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never ends on its own.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// A context tied to an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Bound the call by an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Bound the call by a timeout starting now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the context has already ended.
    pub fn check(&self) -> Result<(), CancelReason> {
        if self.cancellation.is_cancelled() {
            return Err(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelReason::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the context ends.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancellation.cancelled() => CancelReason::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.cancellation.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-supplied data forwarded with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    original_remote_ip: Option<String>,
    correlation_id: Option<String>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the SSH client, sent as `X-Forwarded-For`.
    pub fn with_original_remote_ip(mut self, ip: impl Into<String>) -> Self {
        self.original_remote_ip = Some(ip.into());
        self
    }

    /// Correlation ID of the enclosing command, sent as `X-Request-Id`.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn original_remote_ip(&self) -> Option<&str> {
        self.original_remote_ip.as_deref().filter(|ip| !ip.is_empty())
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref().filter(|id| !id.is_empty())
    }
}
