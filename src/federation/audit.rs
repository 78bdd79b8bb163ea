//! Audit logging for federated login events.
//!
//! Every event is emitted via `tracing::info!` with a JSON `audit` field,
//! so the trail can be extracted by any log aggregator. Subjects are
//! identified by `user_id` only; emails stay out of the logs.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `login.started` | The browser is redirected to the provider |
//! | `user.provisioned` | A first login created a new user identity |
//! | `login.succeeded` | A token was issued and the front-end redirect built |
//! | `login.failed` | Any step of the callback leg failed |

use serde::Serialize;

/// Structured audit event for a login transition.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"login.succeeded"`).
    pub event: &'static str,
    /// Provider name.
    pub provider: String,
    /// Local user identifier, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Key identifier of the issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn base(event: &'static str, provider: &str) -> Self {
        Self {
            event,
            provider: provider.to_string(),
            user_id: None,
            kid: None,
            reason: None,
        }
    }

    /// Construct a `login.started` event.
    #[must_use]
    pub fn started(provider: &str) -> Self {
        Self::base("login.started", provider)
    }

    /// Construct a `user.provisioned` event.
    #[must_use]
    pub fn provisioned(provider: &str, user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::base("user.provisioned", provider)
        }
    }

    /// Construct a `login.succeeded` event.
    #[must_use]
    pub fn succeeded(provider: &str, user_id: &str, kid: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            kid: Some(kid.to_string()),
            ..Self::base("login.succeeded", provider)
        }
    }

    /// Construct a `login.failed` event.
    #[must_use]
    pub fn failed(provider: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base("login.failed", provider)
        }
    }
}

/// Emit an audit event as a JSON blob in the `audit` field.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "login audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
