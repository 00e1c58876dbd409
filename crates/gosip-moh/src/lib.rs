//! Music-on-hold engine, per spec.md §4.7: loads an audio buffer, frames
//! it into 20ms RTP payloads, and paces emission over a 20ms ticker while
//! a call is held. The raw socket write is the caller's job (spec.md §1:
//! "the raw RTP socket I/O that moves the MOH audio buffer onto the
//! wire" is an external collaborator) — this engine hands frames to a
//! [`FrameSink`] the caller supplies.

pub mod engine;
pub mod error;
pub mod rtp;
pub mod source;

pub use engine::{FrameSink, MohEngine};
pub use error::{MohError, Result};
