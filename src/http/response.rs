//! Response classification.
//!
//! # Responsibilities
//! - Pass 2xx responses through with the body untouched
//! - Turn any other status into `Message` or `Status`
//! - Fold retry outcomes into the caller-facing error taxonomy
//!
//! # Design Decisions
//! - Error bodies are read with a size cap; the API's error payloads are small
//! - A body that cannot be read or parsed falls back to the status form

use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use serde::Deserialize;

use crate::error::ApiError;
use crate::resilience::DispatchError;

/// Most bytes read from a non-2xx body.
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Classify a terminal response.
pub async fn classify<B>(response: Response<B>) -> Result<Response<B>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match Limited::new(response.into_body(), MAX_ERROR_BODY_BYTES)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::debug!(status = status.as_u16(), error = %err, "Failed to read error body");
            Bytes::new()
        }
    };

    Err(parse_error(status, &body))
}

/// Build the error for a non-2xx status and its body.
pub fn parse_error(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.is_empty() => ApiError::Message(message),
        _ => ApiError::Status(status),
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Exhausted { .. } | DispatchError::Terminal(_) => ApiError::Unreachable,
            DispatchError::Cancelled(reason) => ApiError::Cancelled(reason),
        }
    }
}
