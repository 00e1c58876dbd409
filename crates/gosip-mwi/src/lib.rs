//! MWI subscription manager and RFC 3842 message-summary bodies, per
//! spec.md §4.8.

pub mod body;
pub mod error;
pub mod manager;
pub mod types;

pub use body::{build_body, subscription_state_header, CONTENT_TYPE};
pub use error::{MwiError, Result};
pub use manager::MwiManager;
pub use types::{MwiState, MwiSubscription};
