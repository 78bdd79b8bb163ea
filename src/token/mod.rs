//! Identity claims and the token issuer.

pub mod claims;
pub mod issuer;

pub use claims::{ClaimsError, DEFAULT_ISSUER, IdentityClaims, TOKEN_LIFETIME, WireClaims};
pub use issuer::{SignedToken, TokenIssuer};
