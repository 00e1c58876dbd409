//! Digest authentication (RFC 2617) for REGISTER/INVITE requests, per
//! spec.md §4.1.

pub mod authenticator;
pub mod device;
pub mod error;
pub mod nonce;

pub use authenticator::DigestAuthenticator;
pub use device::{compute_ha1, Device, DeviceStore};
pub use error::{AuthError, Result};
pub use nonce::{Nonce, NonceTable};

/// Digest realm is a literal constant per spec.md §6.
pub const REALM: &str = "gosip";
