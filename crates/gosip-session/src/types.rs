//! `CallSession`, the dialog entity keyed by Call-ID, per spec.md §3.

use chrono::{DateTime, Utc};

use crate::error::{Result, SessionError};
use crate::fsm::{CallDirection, CallState};

#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub local_uri: String,
    pub remote_uri: String,
    pub from_tag: String,
    pub to_tag: Option<String>,
    pub direction: CallDirection,
    pub device_id: Option<i64>,

    pub state: CallState,
    pub previous_state: Option<CallState>,

    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub held_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,

    pub local_sdp: Option<String>,
    pub remote_sdp: Option<String>,
    pub held_sdp: Option<String>,

    pub transfer_target: Option<String>,
    pub consult_call_id: Option<String>,
}

impl CallSession {
    pub fn new(
        call_id: String,
        local_uri: String,
        remote_uri: String,
        from_tag: String,
        direction: CallDirection,
        device_id: Option<i64>,
    ) -> Self {
        Self {
            call_id,
            local_uri,
            remote_uri,
            from_tag,
            to_tag: None,
            direction,
            device_id,
            state: CallState::Ringing,
            previous_state: None,
            created_at: Utc::now(),
            answered_at: None,
            held_at: None,
            terminated_at: None,
            local_sdp: None,
            remote_sdp: None,
            held_sdp: None,
            transfer_target: None,
            consult_call_id: None,
        }
    }

    /// The only mutator of `state`. Fails without mutating anything if
    /// the transition is not in the table of spec.md §4.4. Records the
    /// previous state and stamps the timestamp bound to the target
    /// state.
    pub fn set_state(&mut self, target: CallState) -> Result<CallState> {
        if !self.state.can_transition_to(target) {
            return Err(SessionError::InvalidStateTransition {
                from: self.state,
                to: target,
            });
        }

        let from = self.state;
        let now = Utc::now();
        match target {
            CallState::Active if self.answered_at.is_none() => {
                self.answered_at = Some(now);
            }
            CallState::Held | CallState::Holding => {
                self.held_at = Some(now);
            }
            CallState::Terminated => {
                self.terminated_at = Some(now);
            }
            _ => {}
        }

        self.previous_state = Some(from);
        self.state = target;
        Ok(from)
    }

    /// `(terminated_at or now) - answered_at` in seconds, or 0 if the
    /// call was never answered.
    pub fn duration_secs(&self) -> i64 {
        match self.answered_at {
            Some(answered) => {
                let end = self.terminated_at.unwrap_or_else(Utc::now);
                (end - answered).num_seconds().max(0)
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> CallSession {
        CallSession::new(
            "call-1".into(),
            "sip:local@gosip".into(),
            "sip:remote@example".into(),
            "tag1".into(),
            CallDirection::Inbound,
            Some(1),
        )
    }

    #[test]
    fn valid_transition_records_previous_state() {
        let mut s = session();
        let prev = s.set_state(CallState::Active).unwrap();
        assert_eq!(prev, CallState::Ringing);
        assert_eq!(s.state, CallState::Active);
        assert_eq!(s.previous_state, Some(CallState::Ringing));
        assert!(s.answered_at.is_some());
    }

    #[test]
    fn invalid_transition_does_not_mutate() {
        let mut s = session();
        let before = s.state;
        let err = s.set_state(CallState::Held);
        assert!(err.is_err());
        assert_eq!(s.state, before);
        assert!(s.previous_state.is_none());
    }

    #[test]
    fn duration_is_zero_when_unanswered() {
        let s = session();
        assert_eq!(s.duration_secs(), 0);
    }

    #[test]
    fn answered_at_set_only_on_first_entry_to_active() {
        let mut s = session();
        s.set_state(CallState::Active).unwrap();
        let first = s.answered_at;
        s.set_state(CallState::Held).unwrap();
        s.set_state(CallState::Active).unwrap();
        assert_eq!(s.answered_at, first);
    }
}
