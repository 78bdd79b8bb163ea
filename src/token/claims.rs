//! Identity claims carried in authority-issued tokens.
//!
//! [`IdentityClaims`] is the typed form used everywhere in the crate. The wire
//! payload is decoded through [`WireClaims`], whose fields are all optional, so
//! a token missing a required claim is rejected with a precise
//! [`ClaimsError`] instead of a generic deserialization failure.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Fixed lifetime of an issued token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "trust-authority";

/// Claims embedded in a signed identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject user identifier
    pub user_id: String,
    /// Subject email
    pub email: String,
    /// Issued-at (Unix epoch seconds)
    pub iat: u64,
    /// Expiry (Unix epoch seconds)
    pub exp: u64,
    /// Issuer name
    pub iss: String,
}

impl IdentityClaims {
    /// Claims issued at `iat` that expire after [`TOKEN_LIFETIME`].
    #[must_use]
    pub fn new(user_id: &str, email: &str, issuer: &str, iat: u64) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            iat,
            exp: iat + TOKEN_LIFETIME.as_secs(),
            iss: issuer.to_string(),
        }
    }
}

/// Claim set as it appears on the wire, before required-field checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    iss: Option<String>,
}

/// A required claim is absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    /// `user_id` is absent or empty
    #[error("token has no subject")]
    MissingSubject,
    /// Another required claim is absent
    #[error("token is missing required claim '{0}'")]
    MissingClaim(&'static str),
}

impl TryFrom<WireClaims> for IdentityClaims {
    type Error = ClaimsError;

    fn try_from(wire: WireClaims) -> Result<Self, Self::Error> {
        let user_id = wire
            .user_id
            .filter(|s| !s.is_empty())
            .ok_or(ClaimsError::MissingSubject)?;

        Ok(Self {
            user_id,
            email: wire.email.ok_or(ClaimsError::MissingClaim("email"))?,
            iat: wire.iat.ok_or(ClaimsError::MissingClaim("iat"))?,
            exp: wire.exp.ok_or(ClaimsError::MissingClaim("exp"))?,
            iss: wire.iss.ok_or(ClaimsError::MissingClaim("iss"))?,
        })
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
