//! Bearer-token verification for resource services.
//!
//! # Verification flow
//!
//! 1. Take the token from `Authorization: Bearer <token>`.
//! 2. Decode the header (no verification) and read `kid`.
//! 3. Resolve `kid` through the injected [`KeyCache`]; on a miss, fetch the
//!    authority key set once, convert the matching entry, and cache it.
//! 4. Verify the RS256 signature and `exp` (no leeway unless configured).
//! 5. Require a non-empty `user_id` claim.
//!
//! Concurrent misses for the same kid may each fetch; there is no
//! de-duplication and no expiry. Unknown kids are not cached either, so every
//! request carrying an unseen kid costs one key-set fetch from the authority.

pub mod cache;
pub mod discovery;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::json;
use tracing::{debug, info, warn};

pub use cache::{InMemoryKeyCache, KeyCache, NoopKeyCache};
pub use discovery::{HttpKeySetSource, KeySetSource, StaticKeySetSource};
pub use middleware::{AuthenticatedUser, require_bearer};

use crate::Result;
use crate::config::VerifierConfig;
use crate::token::{ClaimsError, IdentityClaims, WireClaims};

/// Default clock skew tolerance, in seconds. A token is rejected as soon as
/// `exp` has passed.
pub const DEFAULT_LEEWAY_SECS: u64 = 0;

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// No `Authorization` header, or not a bearer credential
    #[error("missing or malformed header")]
    MalformedHeader,
    /// Token header carries no `kid`
    #[error("no kid")]
    NoKid,
    /// The authority key set has no entry for the `kid`
    #[error("unknown kid")]
    UnknownKid,
    /// The key set could not be fetched or decoded
    #[error("key discovery failed")]
    KeyDiscoveryFailed,
    /// Bad signature, expired, wrong algorithm, or undecodable token
    #[error("invalid token")]
    InvalidToken,
    /// `user_id` claim is absent or empty
    #[error("missing subject")]
    MissingSubject,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Verifies authority-issued tokens without calling the authority per request.
pub struct TokenVerifier {
    source: Arc<dyn KeySetSource>,
    cache: Arc<dyn KeyCache>,
    leeway_secs: u64,
    expected_issuer: Option<String>,
}

impl TokenVerifier {
    /// Create a verifier over `source`, caching keys in `cache`.
    #[must_use]
    pub fn new(source: Arc<dyn KeySetSource>, cache: Arc<dyn KeyCache>) -> Self {
        Self {
            source,
            cache,
            leeway_secs: DEFAULT_LEEWAY_SECS,
            expected_issuer: None,
        }
    }

    /// Verifier fetching from the configured authority over HTTP with an
    /// in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        let source = HttpKeySetSource::new(&config.authority_base_url, config.fetch_timeout)?;
        let mut verifier = Self::new(Arc::new(source), Arc::new(InMemoryKeyCache::new()))
            .with_leeway(config.leeway_secs);
        if let Some(ref issuer) = config.expected_issuer {
            verifier = verifier.with_expected_issuer(issuer.clone());
        }
        Ok(verifier)
    }

    /// Override the `exp` leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Require `iss` to equal `issuer`.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Verify the raw `Authorization` header value.
    pub async fn verify_header(
        &self,
        authorization: Option<&str>,
    ) -> std::result::Result<AuthenticatedUser, Rejection> {
        let result = match authorization.and_then(bearer_token) {
            Some(token) => self.verify_token(token).await.map(|claims| AuthenticatedUser {
                user_id: claims.user_id,
                email: claims.email,
                token: token.to_string(),
            }),
            None => Err(Rejection::MalformedHeader),
        };

        match result {
            Ok(user) => {
                info!(user_id = %user.user_id, "Token validated");
                Ok(user)
            }
            Err(rejection) => {
                warn!(reason = %rejection, "Rejected bearer token");
                Err(rejection)
            }
        }
    }

    /// Verify a bare token string and return its claims.
    pub async fn verify_token(&self, token: &str) -> std::result::Result<IdentityClaims, Rejection> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| {
            debug!(error = %e, "Undecodable token header");
            Rejection::InvalidToken
        })?;

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(Rejection::NoKid)?;

        if header.alg != Algorithm::RS256 {
            debug!(alg = ?header.alg, "Unsupported token algorithm");
            return Err(Rejection::InvalidToken);
        }

        let key = self.resolve_key(&kid).await?;

        let data = jsonwebtoken::decode::<WireClaims>(token, &key, &self.validation()).map_err(|e| {
            debug!(error = %e, kid = %kid, "Token failed validation");
            Rejection::InvalidToken
        })?;

        IdentityClaims::try_from(data.claims).map_err(|e| match e {
            ClaimsError::MissingSubject => Rejection::MissingSubject,
            ClaimsError::MissingClaim(claim) => {
                debug!(claim, "Token missing required claim");
                Rejection::InvalidToken
            }
        })
    }

    /// Cached key for `kid`, fetching the key set on a miss.
    ///
    /// Misses are not remembered: a caller cycling through random kids
    /// triggers one authority fetch per request.
    async fn resolve_key(&self, kid: &str) -> std::result::Result<Arc<DecodingKey>, Rejection> {
        if let Some(key) = self.cache.get(kid) {
            debug!(kid = %kid, "Key cache hit");
            return Ok(key);
        }

        debug!(kid = %kid, "Key cache miss, fetching key set");
        let set = self.source.fetch().await.map_err(|e| {
            warn!(error = %e, "Key set fetch failed");
            Rejection::KeyDiscoveryFailed
        })?;

        let entry = set.find(kid).ok_or(Rejection::UnknownKid)?;
        let key = entry.decoding_key().map_err(|e| {
            warn!(error = %e, kid = %kid, "Key set entry is not a usable RSA key");
            Rejection::KeyDiscoveryFailed
        })?;

        let key = Arc::new(key);
        self.cache.insert(kid, Arc::clone(&key));
        Ok(key)
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::RS256);
        v.leeway = self.leeway_secs;
        v.validate_aud = false;
        v.set_required_spec_claims(&["exp"]);
        if let Some(ref issuer) = self.expected_issuer {
            v.set_issuer(&[issuer]);
        }
        v
    }
}

/// Token from a `Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty() && !token.contains(' ')).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AuthorityKey, KeySet, KeySetPublisher};
    use crate::token::{TOKEN_LIFETIME, TokenIssuer};
    use jsonwebtoken::{EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const AUTHORITY_KEY: &str = include_str!("../../tests/fixtures/authority_key.pem");
    const ROGUE_KEY: &str = include_str!("../../tests/fixtures/rogue_key_pkcs1.pem");

    struct CountingSource {
        set: KeySet,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl KeySetSource for CountingSource {
        async fn fetch(&self) -> Result<KeySet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.set.clone())
        }
    }

    fn authority() -> Arc<AuthorityKey> {
        Arc::new(AuthorityKey::from_pem(AUTHORITY_KEY).unwrap())
    }

    fn counting_verifier() -> (Arc<CountingSource>, TokenVerifier) {
        let set = KeySetPublisher::new(Some(authority())).current_key_set().unwrap();
        let source = Arc::new(CountingSource {
            set,
            calls: AtomicUsize::new(0),
        });
        let verifier = TokenVerifier::new(
            Arc::clone(&source) as Arc<dyn KeySetSource>,
            Arc::new(InMemoryKeyCache::new()),
        );
        (source, verifier)
    }

    fn sign_raw(claims: &serde_json::Value, kid: Option<&str>, pem: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        jsonwebtoken::encode(&header, claims, &key).unwrap()
    }

    fn now() -> u64 {
        crate::token::claims::unix_now()
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Token abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn rejection_reasons_are_stable() {
        assert_eq!(Rejection::MalformedHeader.to_string(), "missing or malformed header");
        assert_eq!(Rejection::NoKid.to_string(), "no kid");
        assert_eq!(Rejection::UnknownKid.to_string(), "unknown kid");
        assert_eq!(Rejection::KeyDiscoveryFailed.to_string(), "key discovery failed");
        assert_eq!(Rejection::InvalidToken.to_string(), "invalid token");
        assert_eq!(Rejection::MissingSubject.to_string(), "missing subject");
    }

    #[tokio::test]
    async fn issued_token_verifies_and_second_call_hits_cache() {
        // GIVEN: a token from the authority
        let (source, verifier) = counting_verifier();
        let token = TokenIssuer::with_default_issuer(Some(authority()))
            .issue("u1", "foo@bar.com")
            .unwrap()
            .token;
        let header = format!("Bearer {token}");

        // WHEN: verified twice
        let first = verifier.verify_header(Some(&header)).await.unwrap();
        let second = verifier.verify_header(Some(&header)).await.unwrap();

        // THEN: both succeed with one fetch
        assert_eq!(first.user_id, "u1");
        assert_eq!(first.email, "foo@bar.com");
        assert_eq!(first.token, token);
        assert_eq!(second, first);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_header_rejected_before_key_lookup() {
        let (source, verifier) = counting_verifier();

        assert_eq!(
            verifier.verify_header(Some("Token abc")).await,
            Err(Rejection::MalformedHeader)
        );
        assert_eq!(verifier.verify_header(None).await, Err(Rejection::MalformedHeader));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_without_kid_is_no_kid() {
        let (source, verifier) = counting_verifier();
        let token = sign_raw(
            &serde_json::json!({"user_id": "u1", "email": "a@b.c", "iat": now(), "exp": now() + 60, "iss": "x"}),
            None,
            AUTHORITY_KEY,
        );

        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::NoKid));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected_without_caching() {
        let (source, verifier) = counting_verifier();
        let token = sign_raw(
            &serde_json::json!({"user_id": "u1", "email": "a@b.c", "iat": now(), "exp": now() + 60, "iss": "x"}),
            Some("not-a-real-kid"),
            ROGUE_KEY,
        );

        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::UnknownKid));
        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::UnknownKid));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let (_, verifier) = counting_verifier();
        let signed = TokenIssuer::with_default_issuer(Some(authority()))
            .issue_at("u1", "a@b.c", 1_000)
            .unwrap();

        assert_eq!(
            verifier.verify_token(&signed.token).await,
            Err(Rejection::InvalidToken)
        );
    }

    #[tokio::test]
    async fn token_expired_one_second_ago_is_invalid() {
        // GIVEN: a correctly signed token whose exp is one second in the past
        let (_, verifier) = counting_verifier();
        let signed = TokenIssuer::with_default_issuer(Some(authority()))
            .issue_at("u1", "a@b.c", now() - TOKEN_LIFETIME.as_secs() - 1)
            .unwrap();
        assert!(signed.claims.exp < now());

        // WHEN/THEN: the default verifier allows no grace period
        assert_eq!(
            verifier.verify_token(&signed.token).await,
            Err(Rejection::InvalidToken)
        );
    }

    #[tokio::test]
    async fn token_expiring_in_a_minute_is_accepted() {
        let (_, verifier) = counting_verifier();
        let signed = TokenIssuer::with_default_issuer(Some(authority()))
            .issue_at("u1", "a@b.c", now() - TOKEN_LIFETIME.as_secs() + 60)
            .unwrap();

        let claims = verifier.verify_token(&signed.token).await.unwrap();
        assert_eq!(claims.user_id, "u1");
    }

    #[tokio::test]
    async fn configured_leeway_admits_recently_expired_token() {
        let (_, verifier) = counting_verifier();
        let verifier = verifier.with_leeway(60);
        let signed = TokenIssuer::with_default_issuer(Some(authority()))
            .issue_at("u1", "a@b.c", now() - TOKEN_LIFETIME.as_secs() - 30)
            .unwrap();

        assert!(verifier.verify_token(&signed.token).await.is_ok());
    }

    #[tokio::test]
    async fn forged_signature_with_real_kid_is_invalid() {
        // GIVEN: a token claiming the authority kid but signed with another key
        let (_, verifier) = counting_verifier();
        let kid = authority().kid().to_string();
        let token = sign_raw(
            &serde_json::json!({"user_id": "u1", "email": "a@b.c", "iat": now(), "exp": now() + 60, "iss": "x"}),
            Some(&kid),
            ROGUE_KEY,
        );

        // WHEN/THEN: signature check fails
        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::InvalidToken));
    }

    #[tokio::test]
    async fn missing_user_id_is_missing_subject() {
        let (_, verifier) = counting_verifier();
        let kid = authority().kid().to_string();
        let token = sign_raw(
            &serde_json::json!({"email": "a@b.c", "iat": now(), "exp": now() + 60, "iss": "x"}),
            Some(&kid),
            AUTHORITY_KEY,
        );

        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::MissingSubject));
    }

    #[tokio::test]
    async fn token_without_exp_is_invalid() {
        let (_, verifier) = counting_verifier();
        let kid = authority().kid().to_string();
        let token = sign_raw(
            &serde_json::json!({"user_id": "u1", "email": "a@b.c", "iat": now(), "iss": "x"}),
            Some(&kid),
            AUTHORITY_KEY,
        );

        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::InvalidToken));
    }

    #[tokio::test]
    async fn expected_issuer_is_enforced() {
        let (_, verifier) = counting_verifier();
        let verifier = verifier.with_expected_issuer("someone-else");
        let token = TokenIssuer::with_default_issuer(Some(authority()))
            .issue("u1", "a@b.c")
            .unwrap()
            .token;

        assert_eq!(verifier.verify_token(&token).await, Err(Rejection::InvalidToken));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (_, verifier) = counting_verifier();
        assert_eq!(
            verifier.verify_header(Some("Bearer not.a.jwt")).await,
            Err(Rejection::InvalidToken)
        );
    }
}
