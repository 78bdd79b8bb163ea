//! Key identifier derivation.
//!
//! The kid is a compatibility contract between the authority and every
//! verifier, whatever language they are written in:
//!
//! ```text
//! kid = base64url_nopad( sha256( spki_pem_text )[0..8] )
//! ```
//!
//! `spki_pem_text` is the exact `-----BEGIN PUBLIC KEY-----` armor including
//! its trailing newline. The result is always 11 URL-safe characters.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a kid.
pub const KID_DIGEST_BYTES: usize = 8;

/// Short, URL-safe fingerprint of a public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Wrap an already-derived identifier (e.g. read from a token header).
    #[must_use]
    pub fn new(kid: impl Into<String>) -> Self {
        Self(kid.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<KeyId> for String {
    fn from(kid: KeyId) -> Self {
        kid.0
    }
}

/// Derive the kid for a public key from its SPKI PEM text.
#[must_use]
pub fn derive_kid(public_pem: &str) -> KeyId {
    let digest = Sha256::digest(public_pem.as_bytes());
    KeyId(URL_SAFE_NO_PAD.encode(&digest[..KID_DIGEST_BYTES]))
}
