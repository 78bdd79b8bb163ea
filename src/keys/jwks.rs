//! Key-set document and its publisher.
//!
//! Wire format, served at [`JWKS_PATH`]:
//!
//! ```json
//! { "keys": [ { "kty": "RSA", "use": "sig", "kid": "…", "alg": "RS256", "n": "…", "e": "…" } ] }
//! ```
//!
//! `n` and `e` are base64url without padding; readers also accept padded values.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use super::authority::AuthorityKey;
use super::kid::KeyId;
use crate::{Error, Result};

/// Well-known path of the key-set document on the authority.
pub const JWKS_PATH: &str = "/api/v1/auth/.well-known/jwks.json";

/// Signature algorithm advertised for every published key.
pub const SIGNING_ALGORITHM: &str = "RS256";

/// Public verification fields for one key. Never carries private material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeySetEntry {
    /// Key type (`RSA`)
    pub kty: String,
    /// Intended usage (`sig`)
    #[serde(rename = "use")]
    pub usage: String,
    /// Key identifier
    pub kid: KeyId,
    /// Signature algorithm (`RS256`)
    pub alg: String,
    /// Modulus, base64url
    pub n: String,
    /// Public exponent, base64url
    pub e: String,
}

impl PublicKeySetEntry {
    /// Build an RSA signing entry from big-endian modulus and exponent bytes.
    #[must_use]
    pub fn rsa(kid: KeyId, modulus: &[u8], exponent: &[u8]) -> Self {
        Self {
            kty: "RSA".to_string(),
            usage: "sig".to_string(),
            kid,
            alg: SIGNING_ALGORITHM.to_string(),
            n: URL_SAFE_NO_PAD.encode(modulus),
            e: URL_SAFE_NO_PAD.encode(exponent),
        }
    }

    /// Convert the wire modulus/exponent into a verification key.
    pub fn decoding_key(&self) -> std::result::Result<DecodingKey, jsonwebtoken::errors::Error> {
        DecodingKey::from_rsa_components(
            self.n.trim_end_matches('='),
            self.e.trim_end_matches('='),
        )
    }
}

/// The published key-set document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Current verification keys
    pub keys: Vec<PublicKeySetEntry>,
}

impl KeySet {
    /// Find the entry whose kid matches.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&PublicKeySetEntry> {
        self.keys.iter().find(|k| k.kid.as_str() == kid)
    }
}

/// Exposes the authority's current public key as a key-set document.
#[derive(Debug, Clone)]
pub struct KeySetPublisher {
    key: Option<Arc<AuthorityKey>>,
}

impl KeySetPublisher {
    /// Create a publisher for the configured key, if any.
    #[must_use]
    pub fn new(key: Option<Arc<AuthorityKey>>) -> Self {
        Self { key }
    }

    /// One-element key set for the active signing key.
    pub fn current_key_set(&self) -> Result<KeySet> {
        let key = self.key.as_ref().ok_or(Error::KeyUnavailable)?;
        Ok(KeySet {
            keys: vec![key.public_entry()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const AUTHORITY_KEY: &str = include_str!("../../tests/fixtures/authority_key.pem");

    fn publisher() -> KeySetPublisher {
        KeySetPublisher::new(Some(Arc::new(AuthorityKey::from_pem(AUTHORITY_KEY).unwrap())))
    }

    #[test]
    fn publishes_single_rsa_signing_key() {
        // GIVEN: a configured authority key
        // WHEN: the current set is requested
        let set = publisher().current_key_set().unwrap();

        // THEN: exactly one RS256 signing entry with the derived kid
        assert_eq!(set.keys.len(), 1);
        let entry = &set.keys[0];
        assert_eq!(entry.kty, "RSA");
        assert_eq!(entry.usage, "sig");
        assert_eq!(entry.alg, "RS256");
        assert_eq!(entry.kid.as_str(), "o8eAoshhCiU");
        assert_eq!(entry.e, "AQAB");
        assert!(!entry.n.contains('='));
    }

    #[test]
    fn missing_key_is_unavailable() {
        let err = KeySetPublisher::new(None).current_key_set().unwrap_err();
        assert!(matches!(err, Error::KeyUnavailable));
    }

    #[test]
    fn wire_shape_uses_use_field_name() {
        let set = publisher().current_key_set().unwrap();
        let json = serde_json::to_value(&set).unwrap();
        let entry = &json["keys"][0];

        assert_eq!(entry["use"], "sig");
        assert_eq!(entry["kid"], "o8eAoshhCiU");
        let mut fields: Vec<&str> = entry.as_object().unwrap().keys().map(String::as_str).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["alg", "e", "kid", "kty", "n", "use"]);
    }

    #[test]
    fn padded_components_still_decode() {
        let mut entry = publisher().current_key_set().unwrap().keys.remove(0);
        entry.e = "AQAB==".to_string();
        assert!(entry.decoding_key().is_ok());
    }

    #[test]
    fn find_matches_by_kid() {
        let set = publisher().current_key_set().unwrap();
        assert!(set.find("o8eAoshhCiU").is_some());
        assert!(set.find("nope").is_none());
    }
}
