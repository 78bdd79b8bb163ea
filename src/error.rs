//! Error types for the trust authority

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the trust authority
pub type Result<T> = std::result::Result<T, Error>;

/// Trust authority errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Private key text is empty or cannot be parsed (fatal at startup)
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// No signing key is configured for this authority
    #[error("Signing key unavailable: no private key configured")]
    KeyUnavailable,

    /// Token signing failed
    #[error("Token signing failed: {0}")]
    SigningFailed(String),

    /// Authorization code could not be exchanged with the provider
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    /// Provider profile lookup failed or returned a malformed payload
    #[error("Provider info unavailable: {0}")]
    ProviderInfoUnavailable(String),

    /// Identity record failed validation
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// A user with this email already exists
    #[error("User already exists for email: {0}")]
    DuplicateEmail(String),

    /// Storage layer failure
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status the authority answers with when a request fails with this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ExchangeFailed(_) | Self::InvalidUser(_) | Self::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ProviderInfoUnavailable(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::DuplicateEmail(_) => StatusCode::CONFLICT,
            Self::InvalidKeyMaterial(_)
            | Self::KeyUnavailable
            | Self::SigningFailed(_)
            | Self::Persistence(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
