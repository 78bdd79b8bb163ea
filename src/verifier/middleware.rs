//! Axum middleware and extractor for authenticated requests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{Rejection, TokenVerifier};

/// Identity attached to a request that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Subject user identifier
    pub user_id: String,
    /// Subject email
    pub email: String,
    /// The raw bearer token, for forwarding to other services
    pub token: String,
}

/// Admit only requests carrying a valid bearer token.
///
/// Install with `axum::middleware::from_fn_with_state(verifier, require_bearer)`.
/// On success an [`AuthenticatedUser`] is inserted into the request
/// extensions; otherwise the request stops with `401`.
pub async fn require_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match verifier.verify_header(authorization).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(Rejection::MalformedHeader)
    }
}
