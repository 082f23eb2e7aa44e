//! Signed view tokens gating access to private sites.
//!
//! A public subdomain is served with no token. A private one requires a
//! short-lived bearer token whose only claim is the subdomain name, passed
//! as a query parameter on the view URL. Verification happens at the serving
//! edge; this crate owns the issuing contract: claim shape, fixed expiry,
//! and the signing-key rotation policy.

pub mod keys;
pub mod token;

pub use keys::{SigningKey, SigningKeyProvider, StaticKeyProvider};
pub use token::{TokenConfig, ViewToken, ViewTokenIssuer};
