//! User identity records and their store.
//!
//! The [`UserStore`] trait abstracts over storage backends. The bundled
//! [`InMemoryUserStore`] keeps two indices under one lock:
//!
//! - `by_id`:    identifier → `UserIdentity`
//! - `by_email`: email      → identifier
//!
//! so the email uniqueness check and the insert happen atomically. A second
//! `create` for an existing email fails with [`Error::DuplicateEmail`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Produces fresh opaque user identifiers.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Identifier generator producing UUID v4 strings.
#[must_use]
pub fn uuid_ids() -> IdGenerator {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// A durable local user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque identifier
    pub id: String,
    /// Unique email
    pub email: String,
    /// Display name
    pub username: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    /// Validate and build a new record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUser`] if the email or username is empty.
    pub fn new(id: impl Into<String>, email: impl Into<String>, username: impl Into<String>) -> Result<Self> {
        let email = email.into();
        let username = username.into();
        if email.trim().is_empty() {
            return Err(Error::InvalidUser("email is required".to_string()));
        }
        if username.trim().is_empty() {
            return Err(Error::InvalidUser("username is required".to_string()));
        }
        Ok(Self {
            id: id.into(),
            email,
            username,
            created_at: Utc::now(),
        })
    }
}

/// Storage backend for user identities.
///
/// Implementations must be `Send + Sync` because the store is shared
/// across request handlers.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Look up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>>;

    /// Look up a user by identifier.
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>>;

    /// Persist a new user.
    ///
    /// Fails with [`Error::DuplicateEmail`] if the email is already taken.
    async fn create(&self, user: UserIdentity) -> Result<()>;
}

#[derive(Default)]
struct Indices {
    by_id: HashMap<String, UserIdentity>,
    by_email: HashMap<String, String>,
}

/// In-memory user store.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Indices>,
}

impl InMemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Returns `true` if no user is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        let inner = self.inner.read();
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>> {
        Ok(self.inner.read().by_id.get(id).cloned())
    }

    async fn create(&self, user: UserIdentity) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.by_email.contains_key(&user.email) {
            return Err(Error::DuplicateEmail(user.email));
        }
        if inner.by_id.contains_key(&user.id) {
            return Err(Error::Persistence(format!("user id {} already exists", user.id)));
        }
        debug!(user_id = %user.id, "Stored user identity");
        inner.by_email.insert(user.email.clone(), user.id.clone());
        inner.by_id.insert(user.id.clone(), user);
        Ok(())
    }
}
