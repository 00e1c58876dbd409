use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("failed to read certificate material: {0}")]
    CertIo(String),

    #[error("failed to parse certificate: {0}")]
    CertParse(String),

    #[error("automatic certificate issuance failed: {0}")]
    AcmeFailed(String),

    #[error("malformed a=crypto line: {0}")]
    CryptoLineMalformed(String),

    #[error("decoded key material too short: need {need} bytes, got {got}")]
    KeyMaterialTooShort { need: usize, got: usize },

    #[error("no SRTP context for Call-ID {0}")]
    NoSrtpContext(String),

    #[error("no ZRTP session for Call-ID {0}")]
    NoZrtpSession(String),

    #[error("ZRTP operation invalid in phase {0:?}")]
    WrongZrtpPhase(crate::zrtp::ZrtpPhase),
}

pub type Result<T> = std::result::Result<T, SecurityError>;
