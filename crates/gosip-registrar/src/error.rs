use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("store error: {0}")]
    Store(String),

    #[error("expires_at must be after created_at")]
    InvalidExpiry,
}

pub type Result<T> = std::result::Result<T, RegistrarError>;
