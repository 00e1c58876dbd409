pub mod hash;
pub mod manager;
pub mod types;

pub use manager::{SasCallback, ZrtpManager};
pub use types::{RetainedSecrets, Zid, ZrtpPhase, ZrtpSession};
