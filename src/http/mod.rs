//! HTTP request subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient::{get, post}
//!     → client.rs (resolve URI, JSON body, forwarding + auth headers)
//!     → request.rs (prepared request, replayable per attempt)
//!     → [resilience::Retry] → transport.rs (one attempt, read timeout)
//!     → response.rs (2xx passthrough, otherwise Message / Status / Unreachable)
//!     → Caller owns the live response body
//! ```
//!
//! # Design Decisions
//! - Header names live in headers.rs only
//! - The client holds no per-call state; every call is independent

pub mod client;
pub mod headers;
pub mod request;
pub mod response;
pub mod transport;

pub use client::ApiClient;
pub use headers::HeaderRole;
pub use request::ApiRequest;
pub use transport::{Transport, TransportError};
