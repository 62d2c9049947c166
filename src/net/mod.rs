//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! gitlab_url + relative URL root
//!     → endpoint.rs (address kind, normalized base, request URIs)
//!     → tls.rs (trust roots and client identity, https only)
//!     → connector.rs (unix / tcp / tls dialer)
//!     → Hand off to the HTTP layer's pooled client
//! ```
//!
//! # Design Decisions
//! - Socket endpoints are addressed as `http://unix/...` so request
//!   construction is identical for every transport
//! - TLS material is loaded once, at client construction
//! - Dial failures surface per request, never at construction

pub mod connector;
pub mod endpoint;
pub mod tls;

pub use connector::ApiConnector;
pub use endpoint::{Endpoint, EndpointKind, INTERNAL_API_PATH};
pub use tls::TlsSettings;
