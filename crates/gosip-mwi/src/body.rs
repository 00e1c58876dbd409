//! RFC 3842 `application/simple-message-summary` body construction, per
//! spec.md §4.8.

use crate::types::MwiState;

pub const CONTENT_TYPE: &str = "application/simple-message-summary";

pub fn build_body(aor: &str, state: MwiState) -> String {
    let flag = if state.new > 0 { "yes" } else { "no" };
    format!(
        "Messages-Waiting: {flag}\r\nMessage-Account: {aor}\r\nVoice-Message: {}/{} ({}/{})\r\n",
        state.new, state.old, state.new_urgent, state.old_urgent
    )
}

/// `active;expires=<n>` while subscribed, `terminated;reason=timeout`
/// once the grant has run out.
pub fn subscription_state_header(remaining_secs: i64) -> String {
    if remaining_secs > 0 {
        format!("active;expires={remaining_secs}")
    } else {
        "terminated;reason=timeout".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_messages_body() {
        let body = build_body("sip:user@example.com", MwiState::default());
        assert_eq!(
            body,
            "Messages-Waiting: no\r\nMessage-Account: sip:user@example.com\r\nVoice-Message: 0/0 (0/0)\r\n"
        );
    }

    #[test]
    fn new_messages_body() {
        let state = MwiState { new: 2, old: 5, new_urgent: 0, old_urgent: 0 };
        let body = build_body("sip:user@example.com", state);
        assert_eq!(
            body,
            "Messages-Waiting: yes\r\nMessage-Account: sip:user@example.com\r\nVoice-Message: 2/5 (0/0)\r\n"
        );
    }

    #[test]
    fn subscription_state_active_while_time_remains() {
        assert_eq!(subscription_state_header(120), "active;expires=120");
    }

    #[test]
    fn subscription_state_terminated_at_zero() {
        assert_eq!(subscription_state_header(0), "terminated;reason=timeout");
    }
}
