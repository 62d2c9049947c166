//! Client for the GitLab internal API.
//!
//! Reaches the API over a unix socket, plain HTTP or HTTPS, authenticates
//! every request with the shared secret and a signed token, retries
//! transient failures and reduces every outcome to a small error set.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod resilience;

pub use crate::config::ClientConfig;
pub use crate::context::{CallContext, RequestMetadata};
pub use crate::error::{ApiError, ApiResult, CancelReason, ConfigurationError};
pub use crate::http::ApiClient;
