//! Session store: Call-ID → session and device-id → sessions, per
//! spec.md §4.3. Grounded in `registrar-core::registrar::location`'s
//! dual-`DashMap` index pattern, with a per-session lock (rather than a
//! single global one) so concurrent re-INVITEs on different dialogs
//! don't serialise on each other while still letting the FSM mutator
//! serialise transitions within one dialog (spec.md §5).

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::fsm::CallState;
use crate::types::CallSession;

pub type SharedSession = Arc<Mutex<CallSession>>;

#[derive(Default)]
pub struct SessionStore {
    by_call_id: DashMap<String, SharedSession>,
    by_device: DashMap<i64, Vec<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: CallSession) -> SharedSession {
        let call_id = session.call_id.clone();
        let device_id = session.device_id;
        let shared = Arc::new(Mutex::new(session));
        self.by_call_id.insert(call_id.clone(), shared.clone());
        if let Some(device_id) = device_id {
            self.by_device.entry(device_id).or_default().push(call_id);
        }
        shared
    }

    pub fn get(&self, call_id: &str) -> Option<SharedSession> {
        self.by_call_id.get(call_id).map(|e| e.clone())
    }

    /// Returns only non-terminated sessions for a device.
    pub fn get_by_device(&self, device_id: i64) -> Vec<SharedSession> {
        let Some(call_ids) = self.by_device.get(&device_id) else {
            return Vec::new();
        };
        call_ids
            .iter()
            .filter_map(|id| self.by_call_id.get(id).map(|e| e.clone()))
            .filter(|session| session.lock().state != CallState::Terminated)
            .collect()
    }

    pub fn remove(&self, call_id: &str) -> Option<SharedSession> {
        let removed = self.by_call_id.remove(call_id).map(|(_, v)| v);
        if let Some(session) = &removed {
            if let Some(device_id) = session.lock().device_id {
                if let Some(mut ids) = self.by_device.get_mut(&device_id) {
                    ids.retain(|id| id != call_id);
                }
            }
        }
        removed
    }

    /// Removes terminated sessions whose `terminated_at + max_age <= now`.
    /// Runs every 5 minutes from the server shell with `max_age = 10min`.
    pub fn cleanup(&self, max_age: chrono::Duration) -> usize {
        let now = Utc::now();
        let stale: Vec<String> = self
            .by_call_id
            .iter()
            .filter_map(|entry| {
                let session = entry.value().lock();
                if session.state == CallState::Terminated {
                    if let Some(terminated_at) = session.terminated_at {
                        if terminated_at + max_age <= now {
                            return Some(entry.key().clone());
                        }
                    }
                }
                None
            })
            .collect();

        let count = stale.len();
        for call_id in stale {
            self.remove(&call_id);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.by_call_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::CallDirection;

    fn make(call_id: &str, device_id: Option<i64>) -> CallSession {
        CallSession::new(
            call_id.to_string(),
            "sip:local@gosip".into(),
            "sip:remote@example".into(),
            "tag1".into(),
            CallDirection::Inbound,
            device_id,
        )
    }

    #[test]
    fn get_by_device_excludes_terminated() {
        let store = SessionStore::new();
        store.insert(make("c1", Some(1)));
        let session2 = store.insert(make("c2", Some(1)));
        session2.lock().set_state(CallState::Terminated).unwrap();

        let active = store.get_by_device(1);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].lock().call_id, "c1");
    }

    #[test]
    fn cleanup_removes_old_terminated_sessions() {
        let store = SessionStore::new();
        let session = store.insert(make("c1", None));
        {
            let mut s = session.lock();
            s.set_state(CallState::Terminated).unwrap();
            s.terminated_at = Some(Utc::now() - chrono::Duration::minutes(20));
        }
        let removed = store.cleanup(chrono::Duration::minutes(10));
        assert_eq!(removed, 1);
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn cleanup_keeps_recent_terminated_sessions() {
        let store = SessionStore::new();
        let session = store.insert(make("c1", None));
        session.lock().set_state(CallState::Terminated).unwrap();
        let removed = store.cleanup(chrono::Duration::minutes(10));
        assert_eq!(removed, 0);
        assert!(store.get("c1").is_some());
    }
}
