//! SIP message/URI value types and the SDP line-oriented parsing/rewrite
//! utilities shared by the hold manager, the SRTP subsystem and the
//! transfer manager.

pub mod digest;
pub mod message;
pub mod sdp;

pub use digest::DigestParams;
pub use message::{Method, Request, Response};
