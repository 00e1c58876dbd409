//! External-collaborator trait ports the shell depends on but does not
//! implement, per spec.md §1 Non-goals and the Design Notes' "express
//! this as a thin capability passed by handle" guidance.

use std::sync::Arc;

use async_trait::async_trait;

/// Routes an outbound call to the PSTN provider. Until a real
/// implementation is wired in, INVITE requests needing outbound routing
/// are answered `501 Not Implemented` (spec.md §4.12).
#[async_trait]
pub trait PstnProvider: Send + Sync {
    async fn route_outbound(&self, target_uri: &str, offer_sdp: &str) -> Result<String, String>;
}

/// Fans out an outbound NOTIFY (or other out-of-dialog request) for a
/// Call-ID. The transfer and MWI managers are constructed with a handle
/// to an implementation of this, never with a back-pointer to the
/// shell.
#[async_trait]
pub trait OutboundNotifier: Send + Sync {
    async fn send_notify(
        &self,
        call_id: &str,
        event: &str,
        subscription_state: &str,
        content_type: &str,
        body: String,
    );
}

/// Adapts [`OutboundNotifier`] to [`gosip_session::transfer::TransferNotifier`]
/// so the transfer manager can emit sipfrag NOTIFYs through the same
/// fan-out seam the MWI manager uses, rather than calling back into the
/// shell directly (spec.md §9 "Cyclic references").
pub struct SipfragNotifier(pub Arc<dyn OutboundNotifier>);

#[async_trait]
impl gosip_session::transfer::TransferNotifier for SipfragNotifier {
    async fn notify_sipfrag(&self, call_id: &str, body: &str) {
        self.0
            .send_notify(call_id, "refer", "active", "message/sipfrag;version=2.0", body.to_string())
            .await;
    }
}
