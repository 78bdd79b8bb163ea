//! The two-leg login flow: redirect to the provider, then turn the returned
//! code into a local user and a signed token.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use super::audit::{self, AuditEvent};
use super::provider::{CodeExchanger, OAuthProvider};
use super::userinfo::{InfoExtractor, ProviderProfile};
use super::users::{IdGenerator, UserIdentity, UserStore, uuid_ids};
use crate::token::TokenIssuer;
use crate::{Error, Result};

/// Drives the authorization-code login against one provider.
///
/// No state is kept between [`start`](Self::start) and
/// [`finish`](Self::finish); the provider round-trip carries the code.
pub struct IdentityFederationFlow {
    provider: Arc<OAuthProvider>,
    exchanger: Arc<dyn CodeExchanger>,
    extractor: Arc<dyn InfoExtractor>,
    users: Arc<dyn UserStore>,
    issuer: TokenIssuer,
    next_id: IdGenerator,
    callback_url: Url,
}

impl IdentityFederationFlow {
    /// Create a flow. The provider also performs the code exchange unless
    /// replaced with [`with_exchanger`](Self::with_exchanger).
    #[must_use]
    pub fn new(
        provider: Arc<OAuthProvider>,
        extractor: Arc<dyn InfoExtractor>,
        users: Arc<dyn UserStore>,
        issuer: TokenIssuer,
        callback_url: Url,
    ) -> Self {
        Self {
            exchanger: Arc::clone(&provider) as Arc<dyn CodeExchanger>,
            provider,
            extractor,
            users,
            issuer,
            next_id: uuid_ids(),
            callback_url,
        }
    }

    /// Replace the code exchanger.
    #[must_use]
    pub fn with_exchanger(mut self, exchanger: Arc<dyn CodeExchanger>) -> Self {
        self.exchanger = exchanger;
        self
    }

    /// Replace the user identifier generator.
    #[must_use]
    pub fn with_id_generator(mut self, next_id: IdGenerator) -> Self {
        self.next_id = next_id;
        self
    }

    /// Provider name this flow serves.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// First leg: the provider authorization URL.
    #[must_use]
    pub fn start(&self) -> Url {
        audit::emit(&AuditEvent::started(self.provider_name()));
        self.provider.authorization_url()
    }

    /// Second leg: exchange `code`, resolve or provision the user, issue a
    /// token and return the front-end redirect carrying it.
    ///
    /// # Errors
    ///
    /// Any failing step aborts the flow. A user created before a later
    /// failure is kept; a retried login finds it.
    pub async fn finish(&self, code: &str) -> Result<Url> {
        match self.complete(code).await {
            Ok(url) => Ok(url),
            Err(e) => {
                audit::emit(&AuditEvent::failed(self.provider_name(), e.to_string()));
                Err(e)
            }
        }
    }

    async fn complete(&self, code: &str) -> Result<Url> {
        if code.trim().is_empty() {
            return Err(Error::ExchangeFailed("missing authorization code".to_string()));
        }

        let access_token = self.exchanger.exchange(code).await?;
        let profile = self.extractor.extract(&access_token).await?;
        let user = self.resolve_user(&profile).await?;
        let signed = self.issuer.issue(&user.id, &user.email)?;

        audit::emit(&AuditEvent::succeeded(
            self.provider_name(),
            &user.id,
            signed.kid.as_str(),
        ));
        info!(user_id = %user.id, provider = %self.provider_name(), "Login succeeded");

        Ok(self.frontend_redirect(&signed.token, &user))
    }

    /// Find the user by email, creating it on first login.
    ///
    /// A concurrent login that wins the create makes ours fail with
    /// [`Error::DuplicateEmail`]; the winner's record is re-fetched.
    pub async fn resolve_user(&self, profile: &ProviderProfile) -> Result<UserIdentity> {
        if let Some(user) = self.users.find_by_email(&profile.email).await? {
            debug!(user_id = %user.id, "Reusing existing user");
            return Ok(user);
        }

        let candidate = UserIdentity::new((self.next_id)(), &profile.email, &profile.name)?;
        match self.users.create(candidate.clone()).await {
            Ok(()) => {
                audit::emit(&AuditEvent::provisioned(
                    self.provider_name(),
                    &candidate.id,
                ));
                Ok(candidate)
            }
            Err(Error::DuplicateEmail(email)) => {
                debug!("User created concurrently, re-fetching");
                self.users.find_by_email(&email).await?.ok_or_else(|| {
                    Error::Persistence("user missing after concurrent create".to_string())
                })
            }
            Err(e) => Err(e),
        }
    }

    fn frontend_redirect(&self, token: &str, user: &UserIdentity) -> Url {
        let mut url = self.callback_url.clone();
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("id", &user.id)
            .append_pair("email", &user.email)
            .append_pair("username", &user.username);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OAuthConfig, ServerConfig};
    use crate::federation::users::InMemoryUserStore;
    use crate::keys::AuthorityKey;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const AUTHORITY_KEY: &str = include_str!("../../tests/fixtures/authority_key.pem");

    struct StubExchanger;

    #[async_trait]
    impl CodeExchanger for StubExchanger {
        async fn exchange(&self, code: &str) -> Result<String> {
            match code {
                "bad-code" => Err(Error::ExchangeFailed("invalid_grant".to_string())),
                _ => Ok(format!("at-{code}")),
            }
        }
    }

    struct StubExtractor(ProviderProfile);

    #[async_trait]
    impl InfoExtractor for StubExtractor {
        async fn extract(&self, _access_token: &str) -> Result<ProviderProfile> {
            Ok(self.0.clone())
        }
    }

    /// Store whose first lookup misses and whose create loses a race.
    struct RacingStore {
        winner: UserIdentity,
        lookups: AtomicUsize,
        attempted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<UserIdentity>> {
            let n = self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((n > 0).then(|| self.winner.clone()))
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<UserIdentity>> {
            Ok(None)
        }

        async fn create(&self, user: UserIdentity) -> Result<()> {
            self.attempted.lock().push(user.id);
            Err(Error::DuplicateEmail(user.email))
        }
    }

    fn provider() -> Arc<OAuthProvider> {
        let oauth = OAuthConfig {
            client_id: "client-123".to_string(),
            ..OAuthConfig::default()
        };
        Arc::new(
            OAuthProvider::from_config(&oauth, &ServerConfig::default(), reqwest::Client::new())
                .unwrap(),
        )
    }

    fn flow_with(users: Arc<dyn UserStore>) -> IdentityFederationFlow {
        let key = Arc::new(AuthorityKey::from_pem(AUTHORITY_KEY).unwrap());
        IdentityFederationFlow::new(
            provider(),
            Arc::new(StubExtractor(ProviderProfile {
                name: "Foo".to_string(),
                email: "foo@bar.com".to_string(),
            })),
            users,
            TokenIssuer::with_default_issuer(Some(key)),
            Url::parse("https://web.example.com/auth/callback/google").unwrap(),
        )
        .with_exchanger(Arc::new(StubExchanger))
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn start_returns_provider_url_with_client_id() {
        let url = flow_with(Arc::new(InMemoryUserStore::new())).start();
        assert_eq!(query(&url, "client_id").as_deref(), Some("client-123"));
    }

    #[tokio::test]
    async fn finish_redirects_to_frontend_with_profile() {
        // GIVEN: an empty store
        let flow = flow_with(Arc::new(InMemoryUserStore::new()));

        // WHEN: the callback leg completes
        let url = flow.finish("good-code").await.unwrap();

        // THEN: the front-end URL carries token and profile fields
        assert_eq!(url.host_str(), Some("web.example.com"));
        assert_eq!(url.path(), "/auth/callback/google");
        assert_eq!(query(&url, "email").as_deref(), Some("foo@bar.com"));
        assert_eq!(query(&url, "username").as_deref(), Some("Foo"));
        assert!(query(&url, "id").is_some());
        assert_eq!(query(&url, "token").unwrap().split('.').count(), 3);
    }

    #[tokio::test]
    async fn empty_code_is_exchange_failed() {
        let err = flow_with(Arc::new(InMemoryUserStore::new()))
            .finish("  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExchangeFailed(_)));
    }

    #[tokio::test]
    async fn exchange_failure_creates_no_user() {
        let store = Arc::new(InMemoryUserStore::new());
        let flow = flow_with(Arc::clone(&store) as Arc<dyn UserStore>);

        let err = flow.finish("bad-code").await.unwrap_err();

        assert!(matches!(err, Error::ExchangeFailed(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn lost_create_race_refetches_winner() {
        // GIVEN: a store where another login creates the user first
        let winner = UserIdentity::new("winner-id", "foo@bar.com", "Foo").unwrap();
        let store = Arc::new(RacingStore {
            winner: winner.clone(),
            lookups: AtomicUsize::new(0),
            attempted: Mutex::new(Vec::new()),
        });
        let flow = flow_with(Arc::clone(&store) as Arc<dyn UserStore>)
            .with_id_generator(Arc::new(|| "loser-id".to_string()));

        // WHEN: the flow resolves the user
        let url = flow.finish("good-code").await.unwrap();

        // THEN: the winner's identifier is used, not ours
        assert_eq!(store.attempted.lock().as_slice(), ["loser-id".to_string()]);
        assert_eq!(query(&url, "id").as_deref(), Some("winner-id"));
    }

    #[tokio::test]
    async fn missing_key_fails_after_user_is_created() {
        // GIVEN: a flow whose issuer has no key
        let store = Arc::new(InMemoryUserStore::new());
        let flow = IdentityFederationFlow::new(
            provider(),
            Arc::new(StubExtractor(ProviderProfile {
                name: "Foo".to_string(),
                email: "foo@bar.com".to_string(),
            })),
            Arc::clone(&store) as Arc<dyn UserStore>,
            TokenIssuer::with_default_issuer(None),
            Url::parse("https://web.example.com/cb").unwrap(),
        )
        .with_exchanger(Arc::new(StubExchanger));

        // WHEN: finishing
        let err = flow.finish("good-code").await.unwrap_err();

        // THEN: issuance fails but the user record stays
        assert!(matches!(err, Error::KeyUnavailable));
        assert_eq!(store.len(), 1);
    }
}
