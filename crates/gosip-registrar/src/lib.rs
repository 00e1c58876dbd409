//! Registrar: authoritative map of device → current contact binding,
//! backed by a cache with store writeback, per spec.md §4.2.

pub mod error;
pub mod registrar;
pub mod store;
pub mod types;

pub use error::{RegistrarError, Result};
pub use registrar::Registrar;
pub use store::RegistrationStore;
pub use types::Registration;
