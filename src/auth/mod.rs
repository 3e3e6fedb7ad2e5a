//! Authentication for habitd
//!
//! Adapts the external identity provider: a bearer credential is verified
//! and resolved into an [`Identity`]. The engine never sees tokens, only
//! resolved identities (or their absence).

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, Identity, TokenVerifier};
