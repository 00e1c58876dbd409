//! ZRTP session manager, per spec.md §4.11.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rand::RngCore;
use tracing::{info, warn};

use crate::error::{Result, SecurityError};
use crate::srtp::{SrtpKeyMaterial, SrtpProfile};
use crate::zrtp::hash::{base32_sas, sha256};
use crate::zrtp::types::{RetainedSecrets, Zid, ZrtpPhase, ZrtpSession};

const DEFAULT_CACHE_EXPIRY_DAYS: i64 = 90;

/// Invoked with the rendered SAS; returns whether the user affirmed it
/// matches what their peer reads aloud.
pub type SasCallback = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub struct ZrtpManager {
    local_zid: Zid,
    cache_expiry_days: i64,
    sessions: DashMap<String, ZrtpSession>,
    retained: DashMap<Zid, RetainedSecrets>,
    sas_callback: SasCallback,
}

impl ZrtpManager {
    pub fn new(local_zid_override: Option<Zid>, cache_expiry_days: Option<i64>, sas_callback: SasCallback) -> Self {
        let local_zid = local_zid_override.unwrap_or_else(generate_zid);
        Self {
            local_zid,
            cache_expiry_days: cache_expiry_days.unwrap_or(DEFAULT_CACHE_EXPIRY_DAYS),
            sessions: DashMap::new(),
            retained: DashMap::new(),
            sas_callback,
        }
    }

    pub fn local_zid(&self) -> Zid {
        self.local_zid
    }

    pub fn start_session(&self, call_id: &str) {
        self.sessions
            .insert(call_id.to_string(), ZrtpSession::new(call_id.to_string(), self.local_zid));
    }

    /// Records the remote ZID and, if a non-expired retained-secret
    /// cache entry exists for that peer, attaches it and marks the
    /// session cached.
    pub fn process_hello(&self, call_id: &str, remote_zid: Zid) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(call_id)
            .ok_or_else(|| SecurityError::NoZrtpSession(call_id.to_string()))?;
        session.remote_zid = Some(remote_zid);

        if let Some(cached) = self.retained.get(&remote_zid) {
            if !cached.is_expired(Utc::now()) {
                session.cached = true;
                session.rs1 = Some(cached.rs1);
                session.rs2 = Some(cached.rs2);
            }
        }
        Ok(())
    }

    /// Stores the shared secret, moves to `key_exchange`, and returns
    /// the 4-character SAS.
    pub fn complete_key_exchange(&self, call_id: &str, s0: &[u8]) -> Result<String> {
        let mut session = self
            .sessions
            .get_mut(call_id)
            .ok_or_else(|| SecurityError::NoZrtpSession(call_id.to_string()))?;
        let remote_zid = session
            .remote_zid
            .ok_or_else(|| SecurityError::WrongZrtpPhase(session.phase))?;

        let mut s0_fixed = [0u8; 32];
        let take = s0.len().min(32);
        s0_fixed[..take].copy_from_slice(&s0[..take]);

        let mut material = Vec::with_capacity(32 + 12 + 12 + 3);
        material.extend_from_slice(&s0_fixed);
        material.extend_from_slice(&session.local_zid);
        material.extend_from_slice(&remote_zid);
        material.extend_from_slice(b"SAS");
        let sas_hash = sha256(&material);
        let sas = base32_sas(&sas_hash[..4])[..4].to_string();

        session.s0 = Some(s0_fixed);
        session.sas = Some(sas.clone());
        session.phase = ZrtpPhase::KeyExchange;
        Ok(sas)
    }

    /// Invokes the UI callback with the SAS. On affirmative, moves to
    /// `secured` and stamps `secured_at`. On negative, emits a
    /// `sas_mismatch` event and leaves the session non-secured.
    pub fn verify_sas(&self, call_id: &str) -> Result<bool> {
        let mut session = self
            .sessions
            .get_mut(call_id)
            .ok_or_else(|| SecurityError::NoZrtpSession(call_id.to_string()))?;
        let sas = session.sas.clone().ok_or(SecurityError::WrongZrtpPhase(session.phase))?;

        if (self.sas_callback)(&sas) {
            session.phase = ZrtpPhase::Secured;
            session.secured_at = Some(Utc::now());
            info!(call_id, sas, "ZRTP SAS verified");
            Ok(true)
        } else {
            warn!(call_id, sas, event = "sas_mismatch", "ZRTP SAS rejected by user");
            Ok(false)
        }
    }

    /// `sha256(s0 || local_zid || remote_zid || "ZRTP-SRTP")`: first 16
    /// bytes are the master key, next 14 the master salt, tagged
    /// AES_CM_128_HMAC_SHA1_80.
    pub fn derive_keys(&self, call_id: &str) -> Result<SrtpKeyMaterial> {
        let session = self
            .sessions
            .get(call_id)
            .ok_or_else(|| SecurityError::NoZrtpSession(call_id.to_string()))?;
        let s0 = session.s0.ok_or(SecurityError::WrongZrtpPhase(session.phase))?;
        let remote_zid = session.remote_zid.ok_or(SecurityError::WrongZrtpPhase(session.phase))?;

        let mut material = Vec::with_capacity(32 + 12 + 12 + 9);
        material.extend_from_slice(&s0);
        material.extend_from_slice(&session.local_zid);
        material.extend_from_slice(&remote_zid);
        material.extend_from_slice(b"ZRTP-SRTP");
        let digest = sha256(&material);

        let _ = SrtpProfile::AesCm128HmacSha1_80; // tag, per spec.md §4.11
        Ok(SrtpKeyMaterial {
            key: digest[..16].to_vec(),
            salt: digest[16..30].to_vec(),
            lifetime: None,
            mki: None,
        })
    }

    /// On a `secured` session, derives and caches retained secrets by
    /// peer ZID. Always removes the in-memory session.
    pub fn end_session(&self, call_id: &str) {
        let Some((_, session)) = self.sessions.remove(call_id) else {
            return;
        };
        if session.phase != ZrtpPhase::Secured {
            return;
        }
        let (Some(s0), Some(remote_zid)) = (session.s0, session.remote_zid) else {
            return;
        };

        let rs1 = sha256(&[&s0[..], b"retained secret 1"].concat());
        let rs2 = sha256(&[&s0[..], b"retained secret 2"].concat());
        let expires_at = Utc::now() + chrono::Duration::hours(self.cache_expiry_days * 24);
        self.retained.insert(remote_zid, RetainedSecrets { rs1, rs2, expires_at });
    }

    /// Returns `None` for an expired or absent cache entry.
    pub fn cache_lookup(&self, remote_zid: Zid) -> Option<RetainedSecrets> {
        let entry = self.retained.get(&remote_zid)?;
        if entry.is_expired(Utc::now()) {
            None
        } else {
            Some(entry.clone())
        }
    }
}

fn generate_zid() -> Zid {
    let mut zid = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut zid);
    zid
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager_with_callback(verdict: bool) -> ZrtpManager {
        ZrtpManager::new(None, None, Arc::new(move |_sas: &str| verdict))
    }

    #[test]
    fn full_session_reaches_secured_on_affirmative_sas() {
        let manager = manager_with_callback(true);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        let sas = manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        assert_eq!(sas.chars().count(), 4);

        let verified = manager.verify_sas("c1").unwrap();
        assert!(verified);
    }

    #[test]
    fn negative_sas_leaves_session_non_secured() {
        let manager = manager_with_callback(false);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        let verified = manager.verify_sas("c1").unwrap();
        assert!(!verified);
    }

    #[test]
    fn derive_keys_yields_aes_cm_128_sized_material() {
        let manager = manager_with_callback(true);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        let material = manager.derive_keys("c1").unwrap();
        assert_eq!(material.key.len(), 16);
        assert_eq!(material.salt.len(), 14);
    }

    #[test]
    fn end_session_caches_retained_secrets_only_when_secured() {
        let manager = manager_with_callback(true);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        manager.verify_sas("c1").unwrap();
        manager.end_session("c1");

        assert!(manager.cache_lookup([7u8; 12]).is_some());
    }

    #[test]
    fn end_session_without_secured_phase_caches_nothing() {
        let manager = manager_with_callback(true);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        manager.end_session("c1");
        assert!(manager.cache_lookup([7u8; 12]).is_none());
    }

    #[test]
    fn process_hello_marks_cached_from_prior_session() {
        let manager = manager_with_callback(true);
        manager.start_session("c1");
        manager.process_hello("c1", [7u8; 12]).unwrap();
        manager.complete_key_exchange("c1", &[9u8; 32]).unwrap();
        manager.verify_sas("c1").unwrap();
        manager.end_session("c1");

        manager.start_session("c2");
        manager.process_hello("c2", [7u8; 12]).unwrap();
        let session = manager.sessions.get("c2").unwrap();
        assert!(session.cached);
        assert!(session.rs1.is_some());
        assert!(session.rs2.is_some());
    }
}
