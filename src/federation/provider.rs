//! OAuth2 provider client: authorization URL and authorization-code exchange.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{OAuthConfig, ServerConfig};
use crate::{Error, Result};

/// Exchanges an authorization code for a provider access token.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Returns the provider access token for `code`.
    async fn exchange(&self, code: &str) -> Result<String>;
}

/// Token endpoint response (only the fields the flow consumes)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// A configured OAuth2 identity provider.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    http_client: Client,
    name: String,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    authorization_endpoint: Url,
    token_endpoint: String,
    scopes: Vec<String>,
}

impl OAuthProvider {
    /// Build the provider from the `oauth` and `server` config sections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the authorization endpoint is not a URL or
    /// the client secret reference cannot be resolved.
    pub fn from_config(oauth: &OAuthConfig, server: &ServerConfig, http_client: Client) -> Result<Self> {
        let authorization_endpoint = Url::parse(&oauth.authorization_endpoint)
            .map_err(|e| Error::Config(format!("Invalid authorization endpoint: {e}")))?;

        Ok(Self {
            http_client,
            name: oauth.provider.clone(),
            client_id: oauth.client_id.clone(),
            client_secret: oauth.resolve_client_secret()?,
            redirect_url: oauth.resolve_redirect_url(&server.api_base_url),
            authorization_endpoint,
            token_endpoint: oauth.token_endpoint.clone(),
            scopes: oauth.scopes.clone(),
        })
    }

    /// Provider name as used in routes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Authorization URL the browser is sent to. Creates no local state.
    #[must_use]
    pub fn authorization_url(&self) -> Url {
        let mut url = self.authorization_endpoint.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.client_id);
            params.append_pair("redirect_uri", &self.redirect_url);

            if !self.scopes.is_empty() {
                params.append_pair("scope", &self.scopes.join(" "));
            }
        }
        url
    }
}

#[async_trait]
impl CodeExchanger for OAuthProvider {
    async fn exchange(&self, code: &str) -> Result<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::ExchangeFailed(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExchangeFailed(format!("HTTP {status} - {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::ExchangeFailed(format!("Failed to parse token response: {e}")))?;

        debug!(
            provider = %self.name,
            token_type = token.token_type.as_deref().unwrap_or("unknown"),
            "Exchanged authorization code"
        );

        Ok(token.access_token)
    }
}
