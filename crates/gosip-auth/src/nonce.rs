//! One-shot nonce table, per spec.md §3/§4.1. Process-wide state owned by
//! the authenticator instance (spec.md §9: "never as ambient singletons").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::RngCore;

const NONCE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct Nonce {
    pub token: String,
    pub issued_at: Instant,
}

impl Nonce {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.issued_at) >= NONCE_TTL
    }
}

/// In-memory, one-shot nonce table. Reads and writes take the same lock;
/// the table is small and short-lived enough that a single `RwLock`
/// around a `HashMap` is preferable to a lock-free map here.
#[derive(Default)]
pub struct NonceTable {
    nonces: RwLock<HashMap<String, Nonce>>,
}

impl NonceTable {
    pub fn new() -> Self {
        Self {
            nonces: RwLock::new(HashMap::new()),
        }
    }

    /// Issues a fresh 128-bit random nonce, hex-encoded to 32 characters.
    pub fn generate(&self) -> Nonce {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let nonce = Nonce {
            token: token.clone(),
            issued_at: Instant::now(),
        };
        self.nonces.write().insert(token, nonce.clone());
        nonce
    }

    /// Validates a nonce without consuming it: present and not older than
    /// 5 minutes.
    pub fn validate(&self, token: &str) -> bool {
        self.nonces
            .read()
            .get(token)
            .is_some_and(|n| !n.is_expired(Instant::now()))
    }

    /// Consumes (removes) a nonce if it is present and not expired,
    /// returning whether it was valid. One-shot use per spec.md §3.
    pub fn consume_if_valid(&self, token: &str) -> bool {
        let mut nonces = self.nonces.write();
        match nonces.remove(token) {
            Some(n) if !n.is_expired(Instant::now()) => true,
            _ => false,
        }
    }

    /// Removes a nonce unconditionally. Callers validate first with
    /// [`NonceTable::validate`] and call this only once the request has
    /// fully succeeded, so a wrong-response or unknown-user attempt
    /// leaves the nonce usable for a retry.
    pub fn consume(&self, token: &str) {
        self.nonces.write().remove(token);
    }

    /// Sweeps nonces older than 5 minutes. Intended to run on a 60s
    /// ticker (spec.md §4.1).
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut nonces = self.nonces.write();
        let before = nonces.len();
        nonces.retain(|_, n| !n.is_expired(now));
        before - nonces.len()
    }

    pub fn len(&self) -> usize {
        self.nonces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
