//! The call-session state machine, per spec.md §4.4. The transition
//! table here is the sole source of truth; `CallSession::set_state` is
//! the only mutator and consults it.

/// `held` means the remote party placed us on hold; `holding` means we
/// placed the remote party on hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Ringing,
    Active,
    Held,
    Holding,
    Transferring,
    Terminated,
}

impl CallState {
    /// Whether `self -> target` appears in spec.md §3's transition
    /// graph. `Terminated` is absorbing: no outbound transitions.
    pub fn can_transition_to(self, target: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, target),
            (Ringing, Active)
                | (Ringing, Terminated)
                | (Active, Held)
                | (Active, Holding)
                | (Active, Transferring)
                | (Active, Terminated)
                | (Held, Active)
                | (Held, Terminated)
                | (Holding, Active)
                | (Holding, Terminated)
                | (Transferring, Active)
                | (Transferring, Holding)
                | (Transferring, Terminated)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [CallState; 6] = [
        CallState::Ringing,
        CallState::Active,
        CallState::Held,
        CallState::Holding,
        CallState::Transferring,
        CallState::Terminated,
    ];

    #[test]
    fn terminated_is_absorbing() {
        for &target in &ALL_STATES {
            assert!(!CallState::Terminated.can_transition_to(target));
        }
    }

    proptest! {
        #[test]
        fn transition_table_is_symmetric_with_literal_spec(from_idx in 0usize..6, to_idx in 0usize..6) {
            let from = ALL_STATES[from_idx];
            let to = ALL_STATES[to_idx];
            let allowed = from.can_transition_to(to);
            // Cross-check against a literal restatement of spec.md §3/§4.4.
            let expected = matches!(
                (from, to),
                (CallState::Ringing, CallState::Active)
                    | (CallState::Ringing, CallState::Terminated)
                    | (CallState::Active, CallState::Held)
                    | (CallState::Active, CallState::Holding)
                    | (CallState::Active, CallState::Transferring)
                    | (CallState::Active, CallState::Terminated)
                    | (CallState::Held, CallState::Active)
                    | (CallState::Held, CallState::Terminated)
                    | (CallState::Holding, CallState::Active)
                    | (CallState::Holding, CallState::Terminated)
                    | (CallState::Transferring, CallState::Active)
                    | (CallState::Transferring, CallState::Holding)
                    | (CallState::Transferring, CallState::Terminated)
            );
            prop_assert_eq!(allowed, expected);
        }
    }
}
