use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthPolicy {
    None,
    Request,
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMinVersion {
    V1_2,
    V1_3,
}

impl Default for TlsMinVersion {
    fn default() -> Self {
        TlsMinVersion::V1_2
    }
}

#[derive(Debug, Clone)]
pub struct ManualConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_bundle_path: Option<PathBuf>,
    pub min_version: TlsMinVersion,
    pub client_auth: ClientAuthPolicy,
}

#[derive(Debug, Clone)]
pub struct AutomaticConfig {
    pub email: String,
    pub primary_domain: String,
    pub additional_sans: Vec<String>,
    pub directory: AcmeDirectory,
    pub certs_dir: PathBuf,
    pub dns_provider_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcmeDirectory {
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub enum CertMode {
    Manual(ManualConfig),
    Automatic(AutomaticConfig),
}

#[derive(Debug, Clone)]
pub struct CertStatus {
    pub enabled: bool,
    pub mode: &'static str,
    pub domains: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub auto_renewal: bool,
    pub last_renewal: Option<DateTime<Utc>>,
    pub next_renewal: Option<DateTime<Utc>>,
    pub valid: bool,
}
