//! Configuration management

use std::{env, fs, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::token::DEFAULT_ISSUER;
use crate::{Error, Result};

/// Prefix for environment variable overrides (`TRUST_AUTHORITY_OAUTH__CLIENT_ID`, ...)
pub const ENV_PREFIX: &str = "TRUST_AUTHORITY_";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Signing authority configuration
    pub authority: AuthorityConfig,
    /// OAuth2 identity provider configuration
    pub oauth: OAuthConfig,
    /// Front-end redirect configuration
    pub frontend: FrontendConfig,
    /// Verifier configuration (used by resource services)
    pub verifier: VerifierConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API, used to derive the OAuth redirect URL
    pub api_base_url: String,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Allowed CORS origins (empty = any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
        }
    }
}

/// Signing authority configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Private key PEM. Supports: literal value, `env:VAR_NAME`, or `file:/path`
    pub private_key: Option<String>,
    /// `iss` claim written into every token
    pub issuer: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

impl AuthorityConfig {
    /// Resolve the private key reference. `None` when unset or resolving to empty.
    pub fn resolve_private_key(&self) -> Result<Option<String>> {
        match self.private_key.as_deref() {
            None => Ok(None),
            Some(reference) => {
                let value = resolve_secret(reference)?;
                Ok((!value.trim().is_empty()).then_some(value))
            }
        }
    }
}

/// OAuth2 identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Provider name used in the route (`/api/v1/auth/{provider}`)
    pub provider: String,
    /// OAuth client identifier
    pub client_id: String,
    /// OAuth client secret. Supports: literal value, `env:VAR_NAME`, or `file:/path`
    pub client_secret: String,
    /// Redirect URL registered with the provider.
    /// Defaults to `{server.api_base_url}/api/v1/auth/{provider}/callback`.
    pub redirect_url: Option<String>,
    /// Provider authorization endpoint
    pub authorization_endpoint: String,
    /// Provider token endpoint
    pub token_endpoint: String,
    /// Provider user-info endpoint
    pub userinfo_endpoint: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Timeout for calls to the provider
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: None,
            authorization_endpoint: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
            timeout: Duration::from_secs(10),
        }
    }
}

impl OAuthConfig {
    /// Effective redirect URL for this provider.
    #[must_use]
    pub fn resolve_redirect_url(&self, api_base_url: &str) -> String {
        self.redirect_url.clone().unwrap_or_else(|| {
            format!(
                "{}/api/v1/auth/{}/callback",
                api_base_url.trim_end_matches('/'),
                self.provider
            )
        })
    }

    /// Resolve the client secret reference.
    pub fn resolve_client_secret(&self) -> Result<String> {
        resolve_secret(&self.client_secret)
    }
}

/// Front-end redirect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// URL the browser is sent to after a successful login
    pub callback_url: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            callback_url: "http://localhost:3000/auth/callback/google".to_string(),
        }
    }
}

/// Verifier configuration, consumed by resource services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Base URL of the authority whose key set is trusted
    pub authority_base_url: String,
    /// Timeout for key-set fetches
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Clock skew tolerance for `exp`, in seconds (0 rejects at expiry)
    pub leeway_secs: u64,
    /// Required `iss` value, if any
    pub expected_issuer: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            authority_base_url: "http://localhost:8080".to_string(),
            fetch_timeout: Duration::from_secs(10),
            leeway_secs: crate::verifier::DEFAULT_LEEWAY_SECS,
            expected_issuer: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars()?;

        Ok(config)
    }

    /// Check the settings `serve` cannot run without.
    pub fn validate_for_serving(&self) -> Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(Error::Config("oauth.client_id is required".to_string()));
        }
        if self.oauth.provider.is_empty() || self.oauth.provider.contains('/') {
            return Err(Error::Config(format!(
                "oauth.provider must be a single path segment, got '{}'",
                self.oauth.provider
            )));
        }
        for (name, value) in [
            ("oauth.authorization_endpoint", &self.oauth.authorization_endpoint),
            ("oauth.token_endpoint", &self.oauth.token_endpoint),
            ("oauth.userinfo_endpoint", &self.oauth.userinfo_endpoint),
            ("frontend.callback_url", &self.frontend.callback_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in URL-valued settings
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Internal(e.to_string()))?;

        for value in [
            &mut self.server.api_base_url,
            &mut self.oauth.authorization_endpoint,
            &mut self.oauth.token_endpoint,
            &mut self.oauth.userinfo_endpoint,
            &mut self.frontend.callback_url,
            &mut self.verifier.authority_base_url,
        ] {
            *value = Self::expand_string(&re, value);
        }
        if let Some(ref mut redirect) = self.oauth.redirect_url {
            *redirect = Self::expand_string(&re, redirect);
        }
        for origin in &mut self.server.cors_origins {
            *origin = Self::expand_string(&re, origin);
        }

        Ok(())
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

/// Resolve a secret reference: `env:VAR`, `file:/path`, or a literal value.
pub fn resolve_secret(reference: &str) -> Result<String> {
    if let Some(var_name) = reference.strip_prefix("env:") {
        env::var(var_name)
            .map_err(|_| Error::Config(format!("environment variable {var_name} is not set")))
    } else if let Some(path) = reference.strip_prefix("file:") {
        fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read secret file {path}: {e}")))
    } else {
        Ok(reference.to_string())
    }
}
