//! `MWIState` and `MWISubscription`, per spec.md §4.8.

use chrono::{DateTime, Utc};

/// Per-AOR message counters. `update_state` only ever sets `new`/`old`;
/// the urgent counters have no setter in this protocol surface and stay
/// at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MwiState {
    pub new: u32,
    pub old: u32,
    pub new_urgent: u32,
    pub old_urgent: u32,
}

#[derive(Debug, Clone)]
pub struct MwiSubscription {
    pub id: String,
    pub aor: String,
    pub call_id: String,
    pub from_tag: String,
    pub contact_uri: String,
    pub cseq: u32,
    pub expires_at: DateTime<Utc>,
}

impl MwiSubscription {
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
