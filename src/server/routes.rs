//! Authority HTTP handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, ServerConfig};
use crate::federation::{
    HttpInfoExtractor, IdentityFederationFlow, InMemoryUserStore, OAuthProvider,
};
use crate::keys::{AuthorityKey, JWKS_PATH, KeySetPublisher};
use crate::token::TokenIssuer;
use crate::{Error, Result};

/// Shared state for the authority routes.
pub struct AppState {
    /// Login flow for the configured provider
    pub flow: IdentityFederationFlow,
    /// Key-set publisher for the active signing key
    pub publisher: KeySetPublisher,
}

impl AppState {
    /// Wire the flow and publisher from configuration.
    ///
    /// An unparsable private key fails here; an absent one is allowed and
    /// makes issuance and publication fail per request.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config
            .authority
            .resolve_private_key()?
            .map(|pem| AuthorityKey::from_pem(&pem).map(Arc::new))
            .transpose()?;

        match key {
            Some(ref key) => tracing::info!(kid = %key.kid(), "Loaded authority signing key"),
            None => warn!("No authority private key configured; token issuance is disabled"),
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.oauth.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        let provider = Arc::new(OAuthProvider::from_config(
            &config.oauth,
            &config.server,
            http_client.clone(),
        )?);
        let extractor = Arc::new(HttpInfoExtractor::new(
            http_client,
            config.oauth.userinfo_endpoint.clone(),
        ));
        let callback_url = Url::parse(&config.frontend.callback_url)
            .map_err(|e| Error::Config(format!("frontend.callback_url: {e}")))?;

        let flow = IdentityFederationFlow::new(
            provider,
            extractor,
            Arc::new(InMemoryUserStore::new()),
            TokenIssuer::new(key.clone(), config.authority.issuer.clone()),
            callback_url,
        );

        Ok(Self {
            flow,
            publisher: KeySetPublisher::new(key),
        })
    }
}

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Error code sent by the provider
    pub error: Option<String>,
    /// Error description sent by the provider
    pub error_description: Option<String>,
}

/// Create the authority router.
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(JWKS_PATH, get(jwks_handler))
        .route("/api/v1/auth/{provider}", get(start_handler))
        .route("/api/v1/auth/{provider}/callback", get(callback_handler))
        .layer(cors_layer(&server.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server.request_timeout,
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/v1/auth/{provider}
async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Response {
    if provider != state.flow.provider_name() {
        return unknown_provider(&provider);
    }
    Redirect::temporary(state.flow.start().as_str()).into_response()
}

/// GET /api/v1/auth/{provider}/callback
async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if provider != state.flow.provider_name() {
        return unknown_provider(&provider);
    }

    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(provider = %provider, error = %error, "Provider returned an error");
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("OAuth error: {error} - {description}"),
        );
    }

    let code = params.code.unwrap_or_default();
    match state.flow.finish(&code).await {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(e) => {
            debug!(error = %e, "Login failed");
            error_response(e.status_code(), &e.to_string())
        }
    }
}

/// GET /api/v1/auth/.well-known/jwks.json
async fn jwks_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.publisher.current_key_set() {
        Ok(set) => Json(set).into_response(),
        Err(e) => error_response(e.status_code(), &e.to_string()),
    }
}

fn unknown_provider(provider: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("Unknown identity provider: {provider}"),
    )
}

/// Create a JSON error response.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
