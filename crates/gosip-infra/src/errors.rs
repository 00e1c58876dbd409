//! Shared error context used by the logging and config helpers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("component {0} is not in a valid state for this operation")]
    InvalidLifecycleState(String),
}

pub type Result<T> = std::result::Result<T, InfraError>;
