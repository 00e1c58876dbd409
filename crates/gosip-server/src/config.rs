//! `GosipConfig`, loaded via `gosip_infra::config::load_toml`, mirroring
//! the configuration table of spec.md §6. Every optional key has a
//! `Default`, matching the teacher's widespread
//! `#[derive(Default)]` config-struct convention (e.g.
//! `infra_common::logging::setup::LoggingConfig`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GosipConfig {
    pub sip_port: u16,
    pub user_agent: String,
    pub tls: TlsConfig,
    pub srtp: SrtpConfig,
    pub zrtp: ZrtpConfig,
}

impl Default for GosipConfig {
    fn default() -> Self {
        Self {
            sip_port: 5060,
            user_agent: "gosip-rs".to_string(),
            tls: TlsConfig::default(),
            srtp: SrtpConfig::default(),
            zrtp: ZrtpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertModeSetting {
    Manual,
    Acme,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthSetting {
    None,
    Request,
    Require,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum MinVersionSetting {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub disable_unencrypted: bool,
    pub port: u16,
    pub wss_port: u16,
    pub cert_mode: CertModeSetting,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub ca_file: Option<String>,
    pub acme_email: Option<String>,
    pub acme_domain: Option<String>,
    pub acme_domains: Vec<String>,
    pub acme_ca: String,
    pub client_auth: ClientAuthSetting,
    pub min_version: MinVersionSetting,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            disable_unencrypted: false,
            port: 5061,
            wss_port: 5081,
            cert_mode: CertModeSetting::Manual,
            cert_file: None,
            key_file: None,
            ca_file: None,
            acme_email: None,
            acme_domain: None,
            acme_domains: Vec::new(),
            acme_ca: "staging".to_string(),
            client_auth: ClientAuthSetting::None,
            min_version: MinVersionSetting::V1_2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SrtpConfig {
    pub enabled: bool,
    pub profile: String,
}

impl Default for SrtpConfig {
    fn default() -> Self {
        Self { enabled: false, profile: "AES_CM_128_HMAC_SHA1_80".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ZrtpConfig {
    pub enabled: bool,
    pub mode: String,
    pub cache_expiry_days: i64,
}

impl Default for ZrtpConfig {
    fn default() -> Self {
        Self { enabled: false, mode: "optional".to_string(), cache_expiry_days: 90 }
    }
}

/// Startup invariant from spec.md §4.12: "If unencrypted is disabled,
/// UDP/TCP listeners must not start and TLS enabled must be true;
/// violation is a startup error."
pub fn validate_listener_config(config: &GosipConfig) -> crate::error::Result<()> {
    if config.tls.disable_unencrypted && !config.tls.enabled {
        return Err(crate::error::ServerError::StartupConfig(
            "tls.disable_unencrypted requires tls.enabled".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_allows_plaintext() {
        assert!(validate_listener_config(&GosipConfig::default()).is_ok());
    }

    #[test]
    fn disable_unencrypted_without_tls_is_a_startup_error() {
        let mut config = GosipConfig::default();
        config.tls.disable_unencrypted = true;
        assert!(validate_listener_config(&config).is_err());
    }

    #[test]
    fn disable_unencrypted_with_tls_enabled_is_fine() {
        let mut config = GosipConfig::default();
        config.tls.disable_unencrypted = true;
        config.tls.enabled = true;
        assert!(validate_listener_config(&config).is_ok());
    }
}
