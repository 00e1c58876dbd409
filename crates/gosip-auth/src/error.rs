use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    NoCredentials,

    #[error("invalid or expired nonce")]
    InvalidNonce,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("digest response did not match")]
    InvalidCredentials,

    #[error("malformed Authorization header: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
