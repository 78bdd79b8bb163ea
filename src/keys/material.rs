//! RSA key material: generation, PEM encoding, and parsing.
//!
//! The authority's key pair is produced once by `trust-authority keygen` and
//! handed to the running service as configuration. Private keys are accepted
//! in either PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`)
//! armor; generated keys are always written as PKCS#8. Public keys are always
//! rendered as SPKI (`BEGIN PUBLIC KEY`) with LF line endings, since that exact
//! text is the input to [`derive_kid`](super::derive_kid).

use std::fs;
use std::path::{Path, PathBuf};

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::{Error, Result};

/// Default modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus accepted for RS256 signing.
pub const MIN_KEY_BITS: usize = 2048;

/// An RSA signing key pair.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

/// Armored text rendering of both halves of a [`KeyPair`].
#[derive(Clone)]
pub struct EncodedKeyPair {
    /// PKCS#8 PEM of the private key
    pub private_pem: String,
    /// SPKI PEM of the public key
    pub public_pem: String,
}

impl std::fmt::Debug for EncodedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedKeyPair")
            .field("private_pem", &"<redacted>")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

impl EncodedKeyPair {
    /// Write `private.pem` and `public.pem` into `dir`, creating it if needed.
    ///
    /// The private key file is readable by the owner only on Unix.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;
        let private_path = dir.join("private.pem");
        let public_path = dir.join("public.pem");

        fs::write(&private_path, &self.private_pem)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&private_path, fs::Permissions::from_mode(0o600))?;
        }
        fs::write(&public_path, &self.public_pem)?;

        Ok((private_path, public_path))
    }
}

impl KeyPair {
    /// Generate a fresh 2048-bit key pair from the OS entropy source.
    pub fn generate() -> Result<Self> {
        Self::generate_with_bits(DEFAULT_KEY_BITS)
    }

    /// Generate a key pair with an explicit modulus size.
    pub fn generate_with_bits(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            return Err(Error::InvalidKeyMaterial(format!(
                "RSA keys must be at least {MIN_KEY_BITS} bits, got {bits}"
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::Internal(format!("RSA key generation failed: {e}")))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Parse a PEM private key (PKCS#8 or PKCS#1).
    pub fn from_pem(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidKeyMaterial("private key is empty".to_string()));
        }

        let private = RsaPrivateKey::from_pkcs8_pem(text)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(text).map_err(|pkcs1_err| {
                    Error::InvalidKeyMaterial(format!(
                        "not a PKCS#8 ({pkcs8_err}) or PKCS#1 ({pkcs1_err}) RSA private key"
                    ))
                })
            })?;

        if private.size() * 8 < MIN_KEY_BITS {
            return Err(Error::InvalidKeyMaterial(format!(
                "RSA keys must be at least {MIN_KEY_BITS} bits, got {}",
                private.size() * 8
            )));
        }

        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Render both halves as PEM text.
    pub fn encode(&self) -> Result<EncodedKeyPair> {
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKeyMaterial(format!("cannot encode private key: {e}")))?;

        Ok(EncodedKeyPair {
            private_pem: private_pem.as_str().to_owned(),
            public_pem: self.public_pem()?,
        })
    }

    /// SPKI PEM of the public half.
    pub fn public_pem(&self) -> Result<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKeyMaterial(format!("cannot encode public key: {e}")))
    }

    /// Big-endian modulus bytes.
    #[must_use]
    pub fn modulus(&self) -> Vec<u8> {
        self.public.n().to_bytes_be()
    }

    /// Big-endian public exponent bytes.
    #[must_use]
    pub fn exponent(&self) -> Vec<u8> {
        self.public.e().to_bytes_be()
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}
