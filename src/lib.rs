//! Trust Authority Library
//!
//! Cross-service trust layer for federated logins.
//!
//! # Features
//!
//! - **Key material**: RSA key generation, PEM encoding, and a stable kid
//!   (first 8 bytes of SHA-256 over the SPKI PEM, base64url without padding)
//! - **Issuance**: RS256 identity tokens with a 24-hour lifetime
//! - **Key-set publication**: the public key served at a well-known path
//! - **Federated login**: OAuth2 authorization-code flow with find-or-create
//!   users by email
//! - **Verification**: an axum middleware for resource services that caches
//!   authority keys by kid

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod federation;
pub mod keys;
pub mod server;
pub mod token;
pub mod verifier;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Internal(format!("Failed to initialise tracing: {e}")))
}
