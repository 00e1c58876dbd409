//! Reference adapters for the external-collaborator ports named in
//! spec.md §1 Non-goals. A real deployment replaces these with clients
//! for the actual repository, PSTN SDK, and outbound transport; they
//! exist here so the binary runs standalone.

use std::collections::HashMap;

use async_trait::async_trait;
use gosip_auth::{compute_ha1, Device, DeviceStore};
use gosip_registrar::{Registration, RegistrationStore};
use gosip_server::OutboundNotifier;
use gosip_session::BridgeExecutor;
use parking_lot::Mutex;
use tracing::info;

/// Seeded with the literal example from spec.md §8 scenario 1 so the
/// binary authenticates out of the box; a real deployment points
/// [`DeviceStore`] at the repository's device collection instead.
pub struct InMemoryDeviceStore {
    devices: HashMap<String, Device>,
}

impl InMemoryDeviceStore {
    pub fn seeded() -> Self {
        let mut devices = HashMap::new();
        devices.insert(
            "alice".to_string(),
            Device {
                id: 1,
                username: "alice".to_string(),
                ha1: compute_ha1("alice", "secret123"),
                display_name: "Alice".to_string(),
                kind: "desk-phone".to_string(),
            },
        );
        Self { devices }
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find_by_username(&self, username: &str) -> gosip_auth::Result<Option<Device>> {
        Ok(self.devices.get(username).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryRegistrationStore {
    bindings: Mutex<HashMap<i64, Registration>>,
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn upsert(&self, registration: &Registration) -> gosip_registrar::Result<()> {
        self.bindings.lock().insert(registration.device_id, registration.clone());
        Ok(())
    }

    async fn delete(&self, device_id: i64) -> gosip_registrar::Result<()> {
        self.bindings.lock().remove(&device_id);
        Ok(())
    }

    async fn find(&self, device_id: i64) -> gosip_registrar::Result<Option<Registration>> {
        Ok(self.bindings.lock().get(&device_id).cloned())
    }
}

/// Logs outbound NOTIFYs (MWI, transfer sipfrags) instead of sending
/// them over a transport; stands in for the transport library's
/// out-of-dialog request path.
pub struct LoggingNotifier;

#[async_trait]
impl OutboundNotifier for LoggingNotifier {
    async fn send_notify(
        &self,
        call_id: &str,
        event: &str,
        subscription_state: &str,
        content_type: &str,
        body: String,
    ) {
        info!(call_id, event, subscription_state, content_type, body, "NOTIFY (logged, no transport wired)");
    }
}

/// Logs the bridge instead of actually connecting media; stands in for
/// the downstream-bridging collaborator (spec.md §9).
pub struct LoggingBridge;

#[async_trait]
impl BridgeExecutor for LoggingBridge {
    async fn bridge(&self, remote_uri: &str, target_uri: &str) -> Result<(), String> {
        info!(remote_uri, target_uri, "transfer bridge (logged, no downstream executor wired)");
        Ok(())
    }
}
