//! Call-session state machine, store, hold/resume, and transfer, per
//! spec.md §4.4-§4.6.

pub mod error;
pub mod fsm;
pub mod hold;
pub mod store;
pub mod transfer;
pub mod types;

pub use error::{Result, SessionError};
pub use fsm::{CallDirection, CallState};
pub use hold::{HoldManager, HoldOutcome};
pub use store::{SessionStore, SharedSession};
pub use transfer::{BridgeExecutor, ReferOutcome, TransferManager, TransferNotifier};
pub use types::CallSession;
