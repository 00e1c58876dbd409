use thiserror::Error;

#[derive(Debug, Error)]
pub enum MwiError {
    #[error("unsupported SUBSCRIBE Event: {0}")]
    BadEvent(String),

    #[error("no subscription with id {0}")]
    SubscriptionNotFound(String),
}

pub type Result<T> = std::result::Result<T, MwiError>;
