//! Where the verifier gets the authority's key set from.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::keys::{JWKS_PATH, KeySet};
use crate::{Error, Result};

/// Supplies the authority's current key set.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the key set.
    async fn fetch(&self) -> Result<KeySet>;
}

/// Fetches the key set from the authority's well-known endpoint.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    http: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    /// Source for the authority at `authority_base_url`, with a bounded
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(authority_base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}{JWKS_PATH}", authority_base_url.trim_end_matches('/')),
        })
    }

    /// Full key-set URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<KeySet> {
        debug!(url = %self.url, "Fetching key set");
        let set = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<KeySet>()
            .await?;
        debug!(keys = set.keys.len(), "Fetched key set");
        Ok(set)
    }
}

/// A fixed, pre-built key set.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySetSource {
    set: KeySet,
}

impl StaticKeySetSource {
    /// Serve `set` on every fetch.
    #[must_use]
    pub fn new(set: KeySet) -> Self {
        Self { set }
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self) -> Result<KeySet> {
        Ok(self.set.clone())
    }
}
