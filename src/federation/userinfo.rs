//! Identity-info extraction from the provider's user-info endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

/// Profile fields the flow needs from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Resolves a provider access token into a profile.
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Fetch the profile belonging to `access_token`.
    async fn extract(&self, access_token: &str) -> Result<ProviderProfile>;
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Calls a Google-style `userinfo` endpoint with the access token as bearer.
#[derive(Debug, Clone)]
pub struct HttpInfoExtractor {
    http_client: Client,
    endpoint: String,
}

impl HttpInfoExtractor {
    /// Create an extractor for `endpoint`.
    #[must_use]
    pub fn new(http_client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl InfoExtractor for HttpInfoExtractor {
    async fn extract(&self, access_token: &str) -> Result<ProviderProfile> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::ProviderInfoUnavailable(format!("User info request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ProviderInfoUnavailable(format!(
                "User info endpoint returned HTTP {}",
                response.status()
            )));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderInfoUnavailable(format!("Malformed user info: {e}")))?;

        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::ProviderInfoUnavailable("User info has no email".to_string()))?;
        let name = info
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::ProviderInfoUnavailable("User info has no name".to_string()))?;

        Ok(ProviderProfile { name, email })
    }
}
