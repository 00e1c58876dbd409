//! MWI subscription manager, per spec.md §4.8. Maintains AOR→state and
//! id→subscription, plus an AOR→subscription-ids reverse index, all
//! consistent under a single lock (unlike the dual-`DashMap` registrar
//! and session stores, which shard their locks per key).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rand::RngCore;
use tracing::{debug, info};

use crate::body::{build_body, subscription_state_header};
use crate::error::{MwiError, Result};
use crate::types::{MwiState, MwiSubscription};

type NotifyCallback = Arc<dyn Fn(&MwiSubscription, String, String) + Send + Sync>;

struct Inner {
    states: HashMap<String, MwiState>,
    subscriptions: HashMap<String, MwiSubscription>,
    by_aor: HashMap<String, Vec<String>>,
}

pub struct MwiManager {
    inner: RwLock<Inner>,
    on_notify: RwLock<Vec<NotifyCallback>>,
}

impl Default for MwiManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MwiManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                states: HashMap::new(),
                subscriptions: HashMap::new(),
                by_aor: HashMap::new(),
            }),
            on_notify: RwLock::new(Vec::new()),
        }
    }

    pub fn on_notify(&self, callback: impl Fn(&MwiSubscription, String, String) + Send + Sync + 'static) {
        self.on_notify.write().push(Arc::new(callback));
    }

    /// `add(id, ...)` replaces an existing entry with the same id and
    /// sets `expires_at = now + expires`. Pushes an initial NOTIFY with
    /// the AOR's current state.
    pub fn subscribe(
        &self,
        call_id: &str,
        from_tag: &str,
        aor: &str,
        contact_uri: &str,
        expires_secs: i64,
    ) -> (String, String) {
        let id = format!("{call_id}-{from_tag}");
        let to_tag = generate_tag();
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_secs);

        let subscription = {
            let mut inner = self.inner.write();
            inner
                .by_aor
                .entry(aor.to_string())
                .or_default()
                .retain(|existing| existing != &id);
            inner.by_aor.entry(aor.to_string()).or_default().push(id.clone());

            let subscription = MwiSubscription {
                id: id.clone(),
                aor: aor.to_string(),
                call_id: call_id.to_string(),
                from_tag: from_tag.to_string(),
                contact_uri: contact_uri.to_string(),
                cseq: 0,
                expires_at,
            };
            inner.subscriptions.insert(id.clone(), subscription.clone());
            subscription
        };

        let state = self.state_for(aor);
        self.notify_one(subscription, state);
        info!(id, aor, "MWI subscription created");
        (id, to_tag)
    }

    /// `Expires: 0` on a SUBSCRIBE removes the subscription.
    pub fn unsubscribe(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let subscription = inner
            .subscriptions
            .remove(id)
            .ok_or_else(|| MwiError::SubscriptionNotFound(id.to_string()))?;
        if let Some(ids) = inner.by_aor.get_mut(&subscription.aor) {
            ids.retain(|existing| existing != id);
        }
        Ok(())
    }

    pub fn refresh(&self, id: &str, expires_secs: i64) -> Result<()> {
        let mut inner = self.inner.write();
        let subscription = inner
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| MwiError::SubscriptionNotFound(id.to_string()))?;
        subscription.expires_at = Utc::now() + chrono::Duration::seconds(expires_secs);
        Ok(())
    }

    /// Short-circuits if `(new, old)` is unchanged from the stored
    /// state; otherwise rewrites it, invokes the state-change callback,
    /// and NOTIFYs every subscriber for the AOR.
    pub fn update_state(&self, aor: &str, new: u32, old: u32) {
        let changed = {
            let mut inner = self.inner.write();
            let state = inner.states.entry(aor.to_string()).or_default();
            if state.new == new && state.old == old {
                false
            } else {
                state.new = new;
                state.old = old;
                true
            }
        };
        if !changed {
            return;
        }

        let (state, subscribers) = {
            let inner = self.inner.read();
            let state = inner.states.get(aor).copied().unwrap_or_default();
            let subscribers: Vec<MwiSubscription> = inner
                .by_aor
                .get(aor)
                .map(|ids| ids.iter().filter_map(|id| inner.subscriptions.get(id).cloned()).collect())
                .unwrap_or_default();
            (state, subscribers)
        };

        for subscription in subscribers {
            self.notify_one(subscription, state);
        }
        debug!(aor, new, old, "MWI state updated");
    }

    pub fn state_for(&self, aor: &str) -> MwiState {
        self.inner.read().states.get(aor).copied().unwrap_or_default()
    }

    /// Removes all entries with `expires_at < now`.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let stale: Vec<String> = inner
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.expires_at < now)
            .map(|(id, _)| id.clone())
            .collect();

        let count = stale.len();
        for id in &stale {
            if let Some(subscription) = inner.subscriptions.remove(id) {
                if let Some(ids) = inner.by_aor.get_mut(&subscription.aor) {
                    ids.retain(|existing| existing != id);
                }
            }
        }
        count
    }

    /// Increments the subscription's CSeq (strictly monotonic per
    /// spec.md §5) and invokes every registered NOTIFY callback.
    fn notify_one(&self, mut subscription: MwiSubscription, state: MwiState) {
        subscription.cseq += 1;
        {
            let mut inner = self.inner.write();
            if let Some(stored) = inner.subscriptions.get_mut(&subscription.id) {
                stored.cseq = subscription.cseq;
            }
        }

        let body = build_body(&subscription.aor, state);
        let subscription_state = subscription_state_header(subscription.remaining_secs(Utc::now()));

        let callbacks = self.on_notify.read().clone();
        for cb in callbacks {
            cb(&subscription, body.clone(), subscription_state.clone());
        }
    }
}

fn generate_tag() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, String)>>);

    #[test]
    fn subscribe_pushes_initial_notify() {
        let manager = MwiManager::new();
        let recorder = Arc::new(Recorder::default());
        let r = recorder.clone();
        manager.on_notify(move |_sub, body, state| {
            r.0.lock().unwrap().push((body, state));
        });

        let (id, _to_tag) = manager.subscribe("abc", "f", "sip:user@example.com", "sip:user@1.2.3.4", 3600);
        assert_eq!(id, "abc-f");

        let notifications = recorder.0.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].0.starts_with(
            "Messages-Waiting: no\r\nMessage-Account: sip:user@example.com\r\nVoice-Message: 0/0 (0/0)\r\n"
        ));
        assert!(notifications[0].1.starts_with("active;expires="));
    }

    #[test]
    fn update_state_notifies_all_subscribers_for_aor() {
        let manager = MwiManager::new();
        let recorder = Arc::new(Recorder::default());
        let r = recorder.clone();
        manager.on_notify(move |_sub, body, _state| {
            r.0.lock().unwrap().push((body, String::new()));
        });

        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 3600);
        manager.subscribe("c2", "f2", "sip:user@example.com", "sip:b@2", 3600);
        recorder.0.lock().unwrap().clear();

        manager.update_state("sip:user@example.com", 2, 5);
        let notifications = recorder.0.lock().unwrap();
        assert_eq!(notifications.len(), 2);
        assert!(notifications
            .iter()
            .all(|(body, _)| body.contains("Messages-Waiting: yes") && body.contains("Voice-Message: 2/5 (0/0)")));
    }

    #[test]
    fn update_state_short_circuits_when_unchanged() {
        let manager = MwiManager::new();
        let recorder = Arc::new(Recorder::default());
        let r = recorder.clone();
        manager.on_notify(move |_sub, body, _state| {
            r.0.lock().unwrap().push((body, String::new()));
        });

        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 3600);
        recorder.0.lock().unwrap().clear();

        manager.update_state("sip:user@example.com", 0, 0);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn cseq_is_monotonic_per_subscription() {
        let manager = MwiManager::new();
        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 3600);
        manager.update_state("sip:user@example.com", 1, 0);
        manager.update_state("sip:user@example.com", 2, 0);

        let cseq = manager.inner.read().subscriptions.get("c1-f1").unwrap().cseq;
        assert_eq!(cseq, 3); // initial NOTIFY + two updates
    }

    #[test]
    fn expires_zero_removes_via_unsubscribe() {
        let manager = MwiManager::new();
        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 3600);
        manager.unsubscribe("c1-f1").unwrap();
        assert!(matches!(
            manager.unsubscribe("c1-f1"),
            Err(MwiError::SubscriptionNotFound(_))
        ));
    }

    #[test]
    fn cleanup_expired_removes_stale_subscriptions() {
        let manager = MwiManager::new();
        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", -10);
        let removed = manager.cleanup_expired();
        assert_eq!(removed, 1);
    }

    #[test]
    fn re_subscribe_with_same_id_replaces_entry() {
        let manager = MwiManager::new();
        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 100);
        manager.subscribe("c1", "f1", "sip:user@example.com", "sip:a@1", 3600);
        let by_aor_len = manager.inner.read().by_aor.get("sip:user@example.com").unwrap().len();
        assert_eq!(by_aor_len, 1);
    }
}
