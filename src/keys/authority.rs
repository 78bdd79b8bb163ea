//! The authority's active signing key.

use jsonwebtoken::EncodingKey;

use super::jwks::PublicKeySetEntry;
use super::kid::{KeyId, derive_kid};
use super::material::KeyPair;
use crate::{Error, Result};

/// A parsed private key together with everything derived from it once at
/// startup: the jsonwebtoken signing key, the public PEM, and the kid.
pub struct AuthorityKey {
    pair: KeyPair,
    encoding: EncodingKey,
    public_pem: String,
    kid: KeyId,
}

impl AuthorityKey {
    /// Parse the configured private key text.
    ///
    /// Failure here is fatal for the authority process.
    pub fn from_pem(private_pem: &str) -> Result<Self> {
        let pair = KeyPair::from_pem(private_pem)?;
        let encoding = EncodingKey::from_rsa_pem(private_pem.trim().as_bytes())
            .map_err(|e| Error::InvalidKeyMaterial(format!("unusable signing key: {e}")))?;
        Self::assemble(pair, encoding)
    }

    /// Build from an in-memory key pair (e.g. straight after `keygen`).
    pub fn from_key_pair(pair: KeyPair) -> Result<Self> {
        let encoded = pair.encode()?;
        let encoding = EncodingKey::from_rsa_pem(encoded.private_pem.as_bytes())
            .map_err(|e| Error::InvalidKeyMaterial(format!("unusable signing key: {e}")))?;
        Self::assemble(pair, encoding)
    }

    fn assemble(pair: KeyPair, encoding: EncodingKey) -> Result<Self> {
        let public_pem = pair.public_pem()?;
        let kid = derive_kid(&public_pem);
        Ok(Self {
            pair,
            encoding,
            public_pem,
            kid,
        })
    }

    /// Key identifier attached to every issued token.
    #[must_use]
    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    /// SPKI PEM of the public half.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    /// Public verification entry for the key-set document.
    #[must_use]
    pub fn public_entry(&self) -> PublicKeySetEntry {
        PublicKeySetEntry::rsa(self.kid.clone(), &self.pair.modulus(), &self.pair.exponent())
    }
}

impl std::fmt::Debug for AuthorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityKey")
            .field("kid", &self.kid)
            .field("bits", &self.pair.bits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORITY_KEY: &str = include_str!("../../tests/fixtures/authority_key.pem");
    const ROGUE_KEY: &str = include_str!("../../tests/fixtures/rogue_key_pkcs1.pem");

    #[test]
    fn kid_is_derived_from_public_half() {
        let key = AuthorityKey::from_pem(AUTHORITY_KEY).unwrap();
        assert_eq!(key.kid().as_str(), "o8eAoshhCiU");
    }

    #[test]
    fn distinct_keys_have_distinct_kids() {
        let a = AuthorityKey::from_pem(AUTHORITY_KEY).unwrap();
        let b = AuthorityKey::from_pem(ROGUE_KEY).unwrap();
        assert_ne!(a.kid(), b.kid());
    }

    #[test]
    fn in_memory_pair_matches_parsed_pem() {
        let pair = KeyPair::from_pem(AUTHORITY_KEY).unwrap();
        let key = AuthorityKey::from_key_pair(pair).unwrap();
        assert_eq!(key.kid().as_str(), "o8eAoshhCiU");
    }

    #[test]
    fn debug_never_prints_key_material() {
        let key = AuthorityKey::from_pem(AUTHORITY_KEY).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("o8eAoshhCiU"));
        assert!(!debug.contains("BEGIN"));
    }
}
