//! The registrar cache and its store-backed lookups, per spec.md §4.2.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::RegistrationStore;
use crate::types::Registration;

type RegisterCallback = Arc<dyn Fn(Registration) + Send + Sync>;
type UnregisterCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Authoritative device→contact binding cache, write-through to an
/// external store. Read-heavy paths take the read lock; mutations take
/// the write lock (spec.md §5).
pub struct Registrar {
    cache: RwLock<HashMap<i64, Registration>>,
    store: Arc<dyn RegistrationStore>,
    on_register: RwLock<Vec<RegisterCallback>>,
    on_unregister: RwLock<Vec<UnregisterCallback>>,
}

impl Registrar {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            store,
            on_register: RwLock::new(Vec::new()),
            on_unregister: RwLock::new(Vec::new()),
        }
    }

    pub fn on_register(&self, callback: impl Fn(Registration) + Send + Sync + 'static) {
        self.on_register.write().push(Arc::new(callback));
    }

    pub fn on_unregister(&self, callback: impl Fn(i64) + Send + Sync + 'static) {
        self.on_unregister.write().push(Arc::new(callback));
    }

    /// REGISTER with `expires = 0` unbinds the device and runs the
    /// unregister callbacks, per spec.md §4.2.
    pub async fn register(
        &self,
        device_id: i64,
        contact_uri: String,
        expires_in_secs: i64,
        user_agent: String,
        remote_addr: String,
        transport: String,
    ) -> Result<Option<Registration>> {
        if expires_in_secs == 0 {
            self.unregister(device_id).await?;
            return Ok(None);
        }

        let now = Utc::now();
        let registration = Registration {
            device_id,
            contact_uri,
            expires_at: now + chrono::Duration::seconds(expires_in_secs),
            user_agent,
            remote_addr,
            transport,
            created_at: now,
            last_seen: now,
        };

        self.store.upsert(&registration).await?;
        self.cache.write().insert(device_id, registration.clone());

        // Snapshot callbacks under the lock, invoke after releasing it
        // (spec.md §5: avoids the registrar re-entrancy deadlock).
        let callbacks = self.on_register.read().clone();
        for cb in callbacks {
            cb(registration.clone());
        }

        info!(device_id, "device registered");
        Ok(Some(registration))
    }

    pub async fn unregister(&self, device_id: i64) -> Result<()> {
        self.store.delete(device_id).await?;
        self.cache.write().remove(&device_id);

        let callbacks = self.on_unregister.read().clone();
        for cb in callbacks {
            cb(device_id);
        }

        info!(device_id, "device unregistered");
        Ok(())
    }

    /// Consults cache first; on miss, reads the store and warms the
    /// cache.
    pub async fn is_registered(&self, device_id: i64) -> Result<bool> {
        if let Some(reg) = self.cache.read().get(&device_id) {
            return Ok(!reg.is_expired_at(Utc::now()));
        }
        match self.refresh_cache(device_id).await? {
            Some(reg) => Ok(!reg.is_expired_at(Utc::now())),
            None => Ok(false),
        }
    }

    pub async fn get(&self, device_id: i64) -> Result<Option<Registration>> {
        if let Some(reg) = self.cache.read().get(&device_id).cloned() {
            return Ok(Some(reg));
        }
        self.refresh_cache(device_id).await
    }

    /// Updates `last_seen` on the cached binding, if any.
    pub fn touch(&self, device_id: i64) {
        if let Some(reg) = self.cache.write().get_mut(&device_id) {
            reg.last_seen = Utc::now();
        }
    }

    pub fn list_active(&self) -> Vec<Registration> {
        let now = Utc::now();
        self.cache
            .read()
            .values()
            .filter(|r| !r.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Evicts cache entries with `expires_at <= now`. Returns the number
    /// evicted. Runs every 60s from the server shell (spec.md §2).
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, reg| !reg.is_expired_at(now));
        let evicted = before - cache.len();
        if evicted > 0 {
            debug!(evicted, "expired registrations evicted from cache");
        }
        evicted
    }

    /// Re-reads a single binding from the store and warms the cache.
    pub async fn refresh_cache(&self, device_id: i64) -> Result<Option<Registration>> {
        let fetched = self.store.find(device_id).await?;
        if let Some(reg) = &fetched {
            self.cache.write().insert(device_id, reg.clone());
        }
        Ok(fetched)
    }
}
