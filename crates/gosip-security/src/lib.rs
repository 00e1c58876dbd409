//! Certificate manager, SRTP subsystem, and ZRTP subsystem, per
//! spec.md §4.9-§4.11.

pub mod cert;
pub mod error;
pub mod srtp;
pub mod zrtp;

pub use error::{Result, SecurityError};
