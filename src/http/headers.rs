//! Header names forming the wire contract with the internal API.

use http::header::HeaderName;
use http::HeaderValue;

/// Role a client-set header plays in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderRole {
    /// The trimmed shared secret, verbatim.
    StaticSecret,
    /// Per-request signed token.
    SignedToken,
    /// Address of the SSH client that triggered the request.
    ForwardedFor,
    /// Correlation ID of the enclosing command.
    CorrelationId,
}

impl HeaderRole {
    pub const ALL: [HeaderRole; 4] = [
        HeaderRole::StaticSecret,
        HeaderRole::SignedToken,
        HeaderRole::ForwardedFor,
        HeaderRole::CorrelationId,
    ];

    /// Header name this role is sent under.
    pub const fn name(self) -> HeaderName {
        match self {
            HeaderRole::StaticSecret => HeaderName::from_static("gitlab-shared-secret"),
            HeaderRole::SignedToken => HeaderName::from_static("gitlab-shell-api-request"),
            HeaderRole::ForwardedFor => HeaderName::from_static("x-forwarded-for"),
            HeaderRole::CorrelationId => HeaderName::from_static("x-request-id"),
        }
    }
}

/// `User-Agent` sent with every request.
pub fn user_agent() -> HeaderValue {
    HeaderValue::from_static("GitLab-Shell")
}
