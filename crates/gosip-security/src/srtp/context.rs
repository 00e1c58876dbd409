//! Per-call SRTP contexts with replay protection, per spec.md §4.10:
//! "Per-call contexts are held in a Call-ID-indexed map with replay
//! protection window 256. Contexts are created on first secure media
//! and removed at BYE."

use dashmap::DashMap;

use crate::error::{Result, SecurityError};
use crate::srtp::key::SrtpKeyMaterial;
use crate::srtp::profile::SrtpProfile;

const REPLAY_WINDOW: u64 = 256;

/// Sliding-window replay guard over RTP sequence numbers, extended to a
/// 48-bit rollover counter the way SRTP implementations track ROC.
struct ReplayWindow {
    highest: Option<u64>,
    seen: u64, // bitmask relative to `highest`; bit 0 == highest itself
}

impl ReplayWindow {
    fn new() -> Self {
        Self { highest: None, seen: 0 }
    }

    /// Returns `true` if `seq` is new (not a replay) and records it.
    fn check_and_record(&mut self, seq: u64) -> bool {
        match self.highest {
            None => {
                self.highest = Some(seq);
                self.seen = 1;
                true
            }
            Some(highest) if seq > highest => {
                let shift = seq - highest;
                self.seen = if shift >= REPLAY_WINDOW { 1 } else { (self.seen << shift) | 1 };
                self.highest = Some(seq);
                true
            }
            Some(highest) => {
                let age = highest - seq;
                if age >= REPLAY_WINDOW {
                    return false;
                }
                let bit = 1u64 << age;
                if self.seen & bit != 0 {
                    false
                } else {
                    self.seen |= bit;
                    true
                }
            }
        }
    }
}

pub struct SrtpContext {
    pub profile: SrtpProfile,
    pub key_material: SrtpKeyMaterial,
    replay: ReplayWindow,
}

impl SrtpContext {
    pub fn check_replay(&mut self, seq: u64) -> bool {
        self.replay.check_and_record(seq)
    }
}

#[derive(Default)]
pub struct SrtpContextStore {
    contexts: DashMap<String, SrtpContext>,
}

impl SrtpContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, call_id: &str, profile: SrtpProfile, key_material: SrtpKeyMaterial) {
        self.contexts.insert(
            call_id.to_string(),
            SrtpContext { profile, key_material, replay: ReplayWindow::new() },
        );
    }

    pub fn remove(&self, call_id: &str) {
        self.contexts.remove(call_id);
    }

    pub fn check_replay(&self, call_id: &str, seq: u64) -> Result<bool> {
        let mut context = self
            .contexts
            .get_mut(call_id)
            .ok_or_else(|| SecurityError::NoSrtpContext(call_id.to_string()))?;
        Ok(context.check_replay(seq))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srtp::key::generate_key_material;

    #[test]
    fn first_packet_is_never_a_replay() {
        let store = SrtpContextStore::new();
        store.create("c1", SrtpProfile::DEFAULT, generate_key_material(SrtpProfile::DEFAULT));
        assert!(store.check_replay("c1", 100).unwrap());
    }

    #[test]
    fn repeated_sequence_number_is_a_replay() {
        let store = SrtpContextStore::new();
        store.create("c1", SrtpProfile::DEFAULT, generate_key_material(SrtpProfile::DEFAULT));
        store.check_replay("c1", 100).unwrap();
        assert!(!store.check_replay("c1", 100).unwrap());
    }

    #[test]
    fn out_of_window_old_sequence_is_a_replay() {
        let store = SrtpContextStore::new();
        store.create("c1", SrtpProfile::DEFAULT, generate_key_material(SrtpProfile::DEFAULT));
        store.check_replay("c1", 1000).unwrap();
        assert!(!store.check_replay("c1", 1000 - 256).unwrap());
    }

    #[test]
    fn in_window_out_of_order_packet_is_accepted_once() {
        let store = SrtpContextStore::new();
        store.create("c1", SrtpProfile::DEFAULT, generate_key_material(SrtpProfile::DEFAULT));
        store.check_replay("c1", 100).unwrap();
        assert!(store.check_replay("c1", 95).unwrap());
        assert!(!store.check_replay("c1", 95).unwrap());
    }

    #[test]
    fn bye_removes_context() {
        let store = SrtpContextStore::new();
        store.create("c1", SrtpProfile::DEFAULT, generate_key_material(SrtpProfile::DEFAULT));
        store.remove("c1");
        assert!(store.check_replay("c1", 1).is_err());
    }
}
