use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("startup configuration error: {0}")]
    StartupConfig(String),

    #[error(transparent)]
    Auth(#[from] gosip_auth::AuthError),

    #[error(transparent)]
    Registrar(#[from] gosip_registrar::RegistrarError),

    #[error(transparent)]
    Session(#[from] gosip_session::SessionError),

    #[error(transparent)]
    Mwi(#[from] gosip_mwi::MwiError),

    #[error(transparent)]
    Security(#[from] gosip_security::SecurityError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
