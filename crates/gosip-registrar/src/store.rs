//! Port onto the external repository's registrations collection
//! (spec.md §1). The registrar writes through this port and otherwise
//! only touches its own in-memory cache.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Registration;

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn upsert(&self, registration: &Registration) -> Result<()>;
    async fn delete(&self, device_id: i64) -> Result<()>;
    async fn find(&self, device_id: i64) -> Result<Option<Registration>>;
}
