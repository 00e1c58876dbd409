use thiserror::Error;

#[derive(Debug, Error)]
pub enum MohError {
    #[error("failed to load audio source: {0}")]
    SourceLoad(String),
}

pub type Result<T> = std::result::Result<T, MohError>;
