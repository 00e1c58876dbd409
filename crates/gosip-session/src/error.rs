use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session for Call-ID {0}")]
    CallNotFound(String),

    #[error("missing SDP body")]
    MissingSdp,

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: crate::fsm::CallState, to: crate::fsm::CallState },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("missing Refer-To header")]
    MissingReferTo,

    #[error("no consult session for attended transfer")]
    ConsultSessionNotFound,

    #[error("operation requires session in {required:?}, found {found:?}")]
    WrongState {
        required: crate::fsm::CallState,
        found: crate::fsm::CallState,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;
