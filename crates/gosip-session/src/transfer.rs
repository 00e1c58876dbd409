//! Transfer manager: inbound REFER (RFC 3515), blind and attended
//! transfer, per spec.md §4.6.
//!
//! The actual media/signalling bridge is an external collaborator (spec.md
//! §9 Open Questions: "the transfer executor is a stub that only records
//! state changes; the actual media/signalling bridge is left to the
//! downstream-bridging collaborator") — [`BridgeExecutor`] is that seam.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Result, SessionError};
use crate::fsm::CallState;
use crate::store::{SessionStore, SharedSession};

/// Connects the remote party to a transfer target "by any available
/// means — new INVITE or provider API" (spec.md §4.6). A fake
/// implementation is provided for tests.
#[async_trait]
pub trait BridgeExecutor: Send + Sync {
    async fn bridge(&self, remote_uri: &str, target_uri: &str) -> std::result::Result<(), String>;
}

/// Emits the `message/sipfrag;version=2.0` NOTIFY bodies that report
/// transfer progress to the referrer.
#[async_trait]
pub trait TransferNotifier: Send + Sync {
    async fn notify_sipfrag(&self, call_id: &str, body: &str);
}

#[derive(Debug, Clone)]
pub enum ReferOutcome {
    Blind { target: String },
    Attended { target: String, consult_call_id: String },
}

pub struct TransferManager {
    bridge: std::sync::Arc<dyn BridgeExecutor>,
    notifier: std::sync::Arc<dyn TransferNotifier>,
}

impl TransferManager {
    pub fn new(bridge: std::sync::Arc<dyn BridgeExecutor>, notifier: std::sync::Arc<dyn TransferNotifier>) -> Self {
        Self { bridge, notifier }
    }

    fn locate(store: &SessionStore, call_id: &str) -> Result<SharedSession> {
        store
            .get(call_id)
            .ok_or_else(|| SessionError::CallNotFound(call_id.to_string()))
    }

    /// Processes an inbound REFER. Returns the 202-Accepted outcome; the
    /// caller is expected to then run [`Self::run_blind_transfer`] or
    /// [`Self::run_attended_transfer`] as a detached background task,
    /// per spec.md §5.
    pub fn handle_refer(
        &self,
        store: &SessionStore,
        call_id: &str,
        refer_to_header: Option<&str>,
    ) -> Result<ReferOutcome> {
        let session = Self::locate(store, call_id)?;
        let raw = refer_to_header.ok_or(SessionError::MissingReferTo)?;
        let (target, replaces_call_id) = parse_refer_to(raw);

        match replaces_call_id {
            None => {
                let mut guard = session.lock();
                guard.set_state(CallState::Transferring)?;
                guard.transfer_target = Some(target.clone());
                Ok(ReferOutcome::Blind { target })
            }
            Some(consult_call_id) => {
                if store.get(&consult_call_id).is_none() {
                    return Err(SessionError::ConsultSessionNotFound);
                }
                let mut guard = session.lock();
                guard.set_state(CallState::Transferring)?;
                guard.transfer_target = Some(target.clone());
                guard.consult_call_id = Some(consult_call_id.clone());
                Ok(ReferOutcome::Attended { target, consult_call_id })
            }
        }
    }

    /// Background execution of a blind transfer: bridges the remote
    /// party to the target, reporting progress via sipfrag NOTIFYs, and
    /// terminates the session on success or reverts it on failure.
    pub async fn run_blind_transfer(&self, store: &SessionStore, call_id: &str) {
        let Some(session) = store.get(call_id) else {
            return;
        };
        let remote_uri = session.lock().remote_uri.clone();
        let target = session.lock().transfer_target.clone().unwrap_or_default();

        self.notifier.notify_sipfrag(call_id, &sipfrag(100, "Trying")).await;

        match self.bridge.bridge(&remote_uri, &target).await {
            Ok(()) => {
                self.notifier.notify_sipfrag(call_id, &sipfrag(200, "OK")).await;
                let _ = session.lock().set_state(CallState::Terminated);
                info!(call_id, "blind transfer completed");
            }
            Err(reason) => {
                self.notifier
                    .notify_sipfrag(call_id, &sipfrag(503, "Service Unavailable"))
                    .await;
                self.revert(&session);
                warn!(call_id, reason, "blind transfer failed");
            }
        }
    }

    /// Background execution of an attended transfer: on success,
    /// terminates both the original and the consult session.
    pub async fn run_attended_transfer(&self, store: &SessionStore, call_id: &str) {
        let Some(session) = store.get(call_id) else {
            return;
        };
        let remote_uri = session.lock().remote_uri.clone();
        let target = session.lock().transfer_target.clone().unwrap_or_default();
        let consult_call_id = session.lock().consult_call_id.clone();

        self.notifier.notify_sipfrag(call_id, &sipfrag(100, "Trying")).await;

        match self.bridge.bridge(&remote_uri, &target).await {
            Ok(()) => {
                self.notifier.notify_sipfrag(call_id, &sipfrag(200, "OK")).await;
                let _ = session.lock().set_state(CallState::Terminated);
                if let Some(consult_id) = consult_call_id {
                    if let Some(consult) = store.get(&consult_id) {
                        let _ = consult.lock().set_state(CallState::Terminated);
                    }
                }
                info!(call_id, "attended transfer completed");
            }
            Err(reason) => {
                self.notifier
                    .notify_sipfrag(call_id, &sipfrag(503, "Service Unavailable"))
                    .await;
                self.revert(&session);
                warn!(call_id, reason, "attended transfer failed");
            }
        }
    }

    /// Outbound attended transfer requires the original session in
    /// `Holding` and the consult session in `Active`.
    pub fn start_outbound_attended(
        &self,
        original: &SharedSession,
        consult: &SharedSession,
        target: String,
        consult_call_id: String,
    ) -> Result<()> {
        {
            let guard = original.lock();
            if guard.state != CallState::Holding {
                return Err(SessionError::WrongState {
                    required: CallState::Holding,
                    found: guard.state,
                });
            }
        }
        {
            let guard = consult.lock();
            if guard.state != CallState::Active {
                return Err(SessionError::WrongState {
                    required: CallState::Active,
                    found: guard.state,
                });
            }
        }
        let mut guard = original.lock();
        guard.set_state(CallState::Transferring)?;
        guard.transfer_target = Some(target);
        guard.consult_call_id = Some(consult_call_id);
        Ok(())
    }

    /// Reverts `held`/`holding` if that was the state before the
    /// transfer began, else `active`, and clears transfer fields.
    fn revert(&self, session: &SharedSession) {
        let mut guard = session.lock();
        let target = match guard.previous_state {
            Some(CallState::Holding) => CallState::Holding,
            _ => CallState::Active,
        };
        if guard.set_state(target).is_ok() {
            guard.transfer_target = None;
            guard.consult_call_id = None;
        }
    }

    /// Cancels an in-progress transfer without a bridging outcome (e.g.
    /// the referrer sent a CANCEL on the implicit subscription).
    pub fn cancel(&self, session: &SharedSession) {
        self.revert(session);
    }
}

fn sipfrag(status: u16, reason: &str) -> String {
    format!("SIP/2.0 {status} {reason}")
}

/// Strips `<>`, URL-decodes `%3B`→`;` and `%3D`→`=`, and extracts the
/// Replaces Call-ID (substring before the first `;`) if present.
fn parse_refer_to(raw: &str) -> (String, Option<String>) {
    let decoded = raw.replace("%3B", ";").replace("%3D", "=");
    let trimmed = decoded
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>');

    let replaces_call_id = trimmed.find("Replaces=").map(|idx| {
        let rest = &trimmed[idx + "Replaces=".len()..];
        let end = rest.find(';').unwrap_or(rest.len());
        rest[..end].to_string()
    });

    let target = trimmed.split('?').next().unwrap_or(trimmed).to_string();
    (target, replaces_call_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::CallDirection;
    use crate::types::CallSession;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeBridge {
        succeed: bool,
    }
    #[async_trait]
    impl BridgeExecutor for FakeBridge {
        async fn bridge(&self, _remote: &str, _target: &str) -> std::result::Result<(), String> {
            if self.succeed {
                Ok(())
            } else {
                Err("downstream refused".into())
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(AsyncMutex<Vec<String>>);
    #[async_trait]
    impl TransferNotifier for RecordingNotifier {
        async fn notify_sipfrag(&self, _call_id: &str, body: &str) {
            self.0.lock().await.push(body.to_string());
        }
    }

    fn active_session(call_id: &str) -> CallSession {
        let mut s = CallSession::new(
            call_id.into(),
            "sip:local@gosip".into(),
            "sip:remote@example".into(),
            "tag1".into(),
            CallDirection::Inbound,
            Some(1),
        );
        s.set_state(CallState::Active).unwrap();
        s
    }

    #[test]
    fn parses_blind_refer_to() {
        let (target, replaces) = parse_refer_to("<sip:1234@example>");
        assert_eq!(target, "sip:1234@example");
        assert!(replaces.is_none());
    }

    #[test]
    fn parses_attended_refer_to_with_replaces() {
        let (target, replaces) = parse_refer_to(
            "<sip:1234@example?Replaces=abc123%3Bto-tag%3D1%3Bfrom-tag%3D2>",
        );
        assert_eq!(target, "sip:1234@example");
        assert_eq!(replaces.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn blind_transfer_success_terminates_session() {
        let store = SessionStore::new();
        store.insert(active_session("c1"));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = TransferManager::new(
            Arc::new(FakeBridge { succeed: true }),
            notifier.clone(),
        );

        let outcome = manager.handle_refer(&store, "c1", Some("<sip:1234@example>")).unwrap();
        assert!(matches!(outcome, ReferOutcome::Blind { .. }));
        assert_eq!(store.get("c1").unwrap().lock().state, CallState::Transferring);

        manager.run_blind_transfer(&store, "c1").await;
        assert_eq!(store.get("c1").unwrap().lock().state, CallState::Terminated);

        let bodies = notifier.0.lock().await.clone();
        assert_eq!(bodies, vec!["SIP/2.0 100 Trying", "SIP/2.0 200 OK"]);
    }

    #[tokio::test]
    async fn blind_transfer_failure_reverts_to_active() {
        let store = SessionStore::new();
        store.insert(active_session("c1"));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = TransferManager::new(
            Arc::new(FakeBridge { succeed: false }),
            notifier.clone(),
        );

        manager.handle_refer(&store, "c1", Some("<sip:1234@example>")).unwrap();
        manager.run_blind_transfer(&store, "c1").await;

        assert_eq!(store.get("c1").unwrap().lock().state, CallState::Active);
        let bodies = notifier.0.lock().await.clone();
        assert_eq!(bodies, vec!["SIP/2.0 100 Trying", "SIP/2.0 503 Service Unavailable"]);
    }

    #[test]
    fn refer_on_unknown_call_id_is_call_not_found() {
        let store = SessionStore::new();
        let manager = TransferManager::new(
            Arc::new(FakeBridge { succeed: true }),
            Arc::new(RecordingNotifier::default()),
        );
        let result = manager.handle_refer(&store, "ghost", Some("<sip:1234@example>"));
        assert!(matches!(result, Err(SessionError::CallNotFound(_))));
    }

    #[test]
    fn attended_refer_without_consult_session_is_rejected() {
        let store = SessionStore::new();
        store.insert(active_session("c1"));
        let manager = TransferManager::new(
            Arc::new(FakeBridge { succeed: true }),
            Arc::new(RecordingNotifier::default()),
        );
        let result = manager.handle_refer(
            &store,
            "c1",
            Some("<sip:1234@example?Replaces=missing%3Bto-tag%3D1>"),
        );
        assert!(matches!(result, Err(SessionError::ConsultSessionNotFound)));
    }
}
