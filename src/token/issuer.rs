//! Token issuance.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Header};
use tracing::debug;

use super::claims::{DEFAULT_ISSUER, IdentityClaims, unix_now};
use crate::keys::{AuthorityKey, KeyId};
use crate::{Error, Result};

/// A signed bearer token and the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// Compact serialized token (`header.payload.signature`)
    pub token: String,
    /// Claims embedded in the payload
    pub claims: IdentityClaims,
    /// Key identifier placed in the header
    pub kid: KeyId,
}

/// Signs RS256 identity tokens with the authority key.
///
/// Stateless: no token store is kept, so validity is purely signature + expiry.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: Option<Arc<AuthorityKey>>,
    issuer: String,
}

impl TokenIssuer {
    /// Create an issuer. `key` is `None` when no private key is configured.
    #[must_use]
    pub fn new(key: Option<Arc<AuthorityKey>>, issuer: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
        }
    }

    /// Issuer using the default `iss` name.
    #[must_use]
    pub fn with_default_issuer(key: Option<Arc<AuthorityKey>>) -> Self {
        Self::new(key, DEFAULT_ISSUER)
    }

    /// The `iss` claim this issuer writes.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for the subject, valid for 24 hours from now.
    pub fn issue(&self, subject_id: &str, subject_email: &str) -> Result<SignedToken> {
        self.issue_at(subject_id, subject_email, unix_now())
    }

    /// Issue a token as if it had been issued at `iat` (Unix seconds).
    pub fn issue_at(&self, subject_id: &str, subject_email: &str, iat: u64) -> Result<SignedToken> {
        let key = self.key.as_ref().ok_or(Error::KeyUnavailable)?;
        let claims = IdentityClaims::new(subject_id, subject_email, &self.issuer, iat);

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid().to_string());

        let token = jsonwebtoken::encode(&header, &claims, key.encoding_key())
            .map_err(|e| Error::SigningFailed(e.to_string()))?;

        debug!(user_id = %subject_id, kid = %key.kid(), exp = claims.exp, "Issued identity token");

        Ok(SignedToken {
            token,
            claims,
            kid: key.kid().clone(),
        })
    }
}
