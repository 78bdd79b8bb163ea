//! Key material, key identifiers, and the public key-set document.

pub mod authority;
pub mod jwks;
pub mod kid;
pub mod material;

pub use authority::AuthorityKey;
pub use jwks::{JWKS_PATH, KeySet, KeySetPublisher, PublicKeySetEntry};
pub use kid::{KeyId, derive_kid};
pub use material::{EncodedKeyPair, KeyPair};
