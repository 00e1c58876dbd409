use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binding of a device to a contact URI, per spec.md §3.
///
/// Invariant: at most one active registration per `device_id`;
/// `expires_at > created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub device_id: i64,
    pub contact_uri: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: String,
    pub remote_addr: String,
    pub transport: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Registration {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
