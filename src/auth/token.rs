//! Per-request signed token.

use jsonwebtoken::{encode, get_current_timestamp, Algorithm, Header};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::Credentials;

/// Fixed issuer claim.
pub const ISSUER: &str = "gitlab-shell";

/// Lifetime of a token, in seconds.
pub const TOKEN_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn issued_at(iat: u64) -> Self {
        Self {
            iss: ISSUER.to_string(),
            iat,
            exp: iat + TOKEN_TTL_SECS,
        }
    }
}

/// Sign a fresh HS256 token issued now.
pub fn sign(credentials: &Credentials) -> Result<String, jsonwebtoken::errors::Error> {
    sign_claims(credentials, &Claims::issued_at(get_current_timestamp()))
}

pub fn sign_claims(
    credentials: &Credentials,
    claims: &Claims,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::new(Algorithm::HS256), claims, credentials.signing_key())
}
