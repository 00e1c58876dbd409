use chrono::{DateTime, Utc};

pub type Zid = [u8; 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZrtpPhase {
    Idle,
    Discovery,
    KeyExchange,
    Secured,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ZrtpSession {
    pub call_id: String,
    pub local_zid: Zid,
    pub remote_zid: Option<Zid>,
    pub phase: ZrtpPhase,
    pub cached: bool,
    pub rs1: Option<[u8; 32]>,
    pub rs2: Option<[u8; 32]>,
    pub s0: Option<[u8; 32]>,
    pub sas: Option<String>,
    pub secured_at: Option<DateTime<Utc>>,
}

impl ZrtpSession {
    pub fn new(call_id: String, local_zid: Zid) -> Self {
        Self {
            call_id,
            local_zid,
            remote_zid: None,
            phase: ZrtpPhase::Discovery,
            cached: false,
            rs1: None,
            rs2: None,
            s0: None,
            sas: None,
            secured_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetainedSecrets {
    pub rs1: [u8; 32],
    pub rs2: [u8; 32],
    pub expires_at: DateTime<Utc>,
}

impl RetainedSecrets {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
