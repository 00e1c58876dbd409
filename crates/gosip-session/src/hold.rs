//! Hold manager: re-INVITE handling, SDP direction rewrite, MOH
//! triggering, per spec.md §4.5.

use std::path::PathBuf;
use std::sync::Arc;

use gosip_moh::{FrameSink, MohEngine};
use gosip_sip::sdp;
use tracing::info;

use crate::error::{Result, SessionError};
use crate::fsm::CallState;
use crate::store::{SessionStore, SharedSession};

/// Outcome of processing an in-dialog re-INVITE; the server shell turns
/// this into the actual 200 OK response.
#[derive(Debug, Clone)]
pub enum HoldOutcome {
    Held { answer_sdp: String },
    Resumed { answer_sdp: String },
    MediaUpdate { answer_sdp: String },
}

pub struct HoldManager {
    moh: Arc<MohEngine>,
    moh_audio_path: Option<PathBuf>,
}

impl HoldManager {
    pub fn new(moh: Arc<MohEngine>, moh_audio_path: Option<PathBuf>) -> Self {
        Self { moh, moh_audio_path }
    }

    fn locate<'a>(store: &'a SessionStore, call_id: &str) -> Result<SharedSession> {
        store
            .get(call_id)
            .ok_or_else(|| SessionError::CallNotFound(call_id.to_string()))
    }

    /// Processes an in-dialog re-INVITE on `call_id`, per spec.md §4.5
    /// steps 1-6.
    pub fn handle_reinvite(
        &self,
        store: &SessionStore,
        call_id: &str,
        offer_sdp: Option<&str>,
    ) -> Result<HoldOutcome> {
        let session = Self::locate(store, call_id)?;
        let offer = offer_sdp.ok_or(SessionError::MissingSdp)?;

        let classification = sdp::classify_hold(offer);
        let mut guard = session.lock();

        match (classification, guard.state) {
            (Some(_), CallState::Active) => {
                guard.set_state(CallState::Held)?;
                guard.held_sdp = Some(offer.to_string());
                let answer = sdp::modify_direction(offer, sdp::Direction::RecvOnly);
                info!(call_id, "remote placed call on hold");
                Ok(HoldOutcome::Held { answer_sdp: answer })
            }
            (None, CallState::Held) => {
                guard.set_state(CallState::Active)?;
                guard.held_sdp = None;
                drop(guard);
                self.moh.stop(call_id);
                let answer = sdp::modify_direction(offer, sdp::Direction::SendRecv);
                info!(call_id, "call resumed from hold");
                Ok(HoldOutcome::Resumed { answer_sdp: answer })
            }
            _ => {
                guard.remote_sdp = Some(offer.to_string());
                let answer = sdp::modify_direction(offer, sdp::Direction::SendRecv);
                Ok(HoldOutcome::MediaUpdate { answer_sdp: answer })
            }
        }
    }

    /// Builds the offer for an outbound hold re-INVITE. Only valid from
    /// `Active`; does not mutate session state (that happens once the
    /// 2xx arrives, via [`confirm_outbound_hold`]).
    pub fn build_outbound_hold_offer(&self, session: &SharedSession) -> Result<String> {
        let guard = session.lock();
        if guard.state != CallState::Active {
            return Err(SessionError::WrongState {
                required: CallState::Active,
                found: guard.state,
            });
        }
        let base = guard.local_sdp.clone().unwrap_or_default();
        Ok(sdp::modify_direction(&base, sdp::Direction::SendOnly))
    }

    /// Called once the outbound hold re-INVITE receives a 2xx.
    pub fn confirm_outbound_hold(
        &self,
        session: &SharedSession,
        call_id: &str,
        sink: Arc<dyn FrameSink>,
    ) -> Result<()> {
        session.lock().set_state(CallState::Holding)?;
        self.moh
            .start(call_id.to_string(), self.moh_audio_path.clone(), sink);
        Ok(())
    }

    /// Builds the offer for an outbound resume re-INVITE. Only valid
    /// from `Holding`.
    pub fn build_outbound_resume_offer(&self, session: &SharedSession) -> Result<String> {
        let guard = session.lock();
        if guard.state != CallState::Holding {
            return Err(SessionError::WrongState {
                required: CallState::Holding,
                found: guard.state,
            });
        }
        let base = guard.local_sdp.clone().unwrap_or_default();
        Ok(sdp::modify_direction(&base, sdp::Direction::SendRecv))
    }

    pub fn confirm_outbound_resume(&self, session: &SharedSession, call_id: &str) -> Result<()> {
        session.lock().set_state(CallState::Active)?;
        self.moh.stop(call_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::CallDirection;
    use crate::types::CallSession;
    use pretty_assertions::assert_eq;

    fn session_with_state(state: CallState) -> CallSession {
        let mut s = CallSession::new(
            "call-1".into(),
            "sip:local@gosip".into(),
            "sip:remote@example".into(),
            "tag1".into(),
            CallDirection::Inbound,
            Some(1),
        );
        s.local_sdp = Some("v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendrecv\r\n".to_string());
        if state != CallState::Ringing {
            s.set_state(CallState::Active).unwrap();
        }
        if state != CallState::Ringing && state != CallState::Active {
            s.set_state(state).unwrap();
        }
        s
    }

    #[test]
    fn inbound_hold_offer_moves_session_to_held() {
        let store = SessionStore::new();
        store.insert(session_with_state(CallState::Active));

        let manager = HoldManager::new(Arc::new(MohEngine::new()), None);
        let offer = "v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendonly\r\n";
        let outcome = manager.handle_reinvite(&store, "call-1", Some(offer)).unwrap();

        match outcome {
            HoldOutcome::Held { answer_sdp } => {
                assert!(answer_sdp.contains("a=recvonly"));
                assert!(!answer_sdp.contains("a=sendonly"));
            }
            other => panic!("expected Held, got {other:?}"),
        }
        assert_eq!(store.get("call-1").unwrap().lock().state, CallState::Held);
    }

    #[test]
    fn resume_from_held_moves_to_active() {
        let store = SessionStore::new();
        store.insert(session_with_state(CallState::Active));

        let manager = HoldManager::new(Arc::new(MohEngine::new()), None);
        let hold_offer = "v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendonly\r\n";
        manager.handle_reinvite(&store, "call-1", Some(hold_offer)).unwrap();

        let resume_offer = "v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendrecv\r\n";
        let outcome = manager.handle_reinvite(&store, "call-1", Some(resume_offer)).unwrap();
        match outcome {
            HoldOutcome::Resumed { answer_sdp } => assert!(answer_sdp.contains("a=sendrecv")),
            other => panic!("expected Resumed, got {other:?}"),
        }
        assert_eq!(store.get("call-1").unwrap().lock().state, CallState::Active);
    }

    #[test]
    fn missing_session_is_call_not_found() {
        let store = SessionStore::new();
        let manager = HoldManager::new(Arc::new(MohEngine::new()), None);
        let result = manager.handle_reinvite(&store, "ghost", Some("v=0\r\n"));
        assert!(matches!(result, Err(SessionError::CallNotFound(_))));
    }

    #[test]
    fn missing_sdp_is_bad_request() {
        let store = SessionStore::new();
        store.insert(session_with_state(CallState::Active));
        let manager = HoldManager::new(Arc::new(MohEngine::new()), None);
        let result = manager.handle_reinvite(&store, "call-1", None);
        assert!(matches!(result, Err(SessionError::MissingSdp)));
    }
}
