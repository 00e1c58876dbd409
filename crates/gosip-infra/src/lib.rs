//! Ambient stack shared across the gosip-rs workspace: structured logging,
//! component lifecycle, and configuration loading helpers.

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod logging;

pub use errors::{InfraError, Result};
pub use lifecycle::{Component, ComponentState};
pub use logging::{setup_logging, LoggingConfig};
