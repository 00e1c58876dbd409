//! Certificate manager: manual and automatic (ACME) modes, per spec.md
//! §4.9.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tracing::info;
use x509_parser::prelude::*;

use crate::cert::acme::AcmeClient;
use crate::cert::types::{CertMode, CertStatus, ClientAuthPolicy, ManualConfig, TlsMinVersion};
use crate::error::{Result, SecurityError};

struct Loaded {
    cert_chain: Vec<CertificateDer<'static>>,
    not_after: DateTime<Utc>,
    issuer_cn: String,
    last_renewal: Option<DateTime<Utc>>,
}

pub struct CertificateManager {
    mode: CertMode,
    acme: Option<Arc<dyn AcmeClient>>,
    loaded: RwLock<Option<Loaded>>,
}

impl CertificateManager {
    pub fn manual(config: ManualConfig) -> Result<Self> {
        let manager = Self { mode: CertMode::Manual(config), acme: None, loaded: RwLock::new(None) };
        manager.reload()?;
        Ok(manager)
    }

    pub fn automatic(config: crate::cert::types::AutomaticConfig, acme: Arc<dyn AcmeClient>) -> Self {
        Self { mode: CertMode::Automatic(config), acme: Some(acme), loaded: RwLock::new(None) }
    }

    /// Re-reads cert/key from the configured paths (manual mode only).
    pub fn reload(&self) -> Result<()> {
        let CertMode::Manual(config) = &self.mode else {
            return Ok(());
        };
        let loaded = load_from_disk(config)?;
        *self.loaded.write() = Some(loaded);
        Ok(())
    }

    /// Synchronously drives the ACME client to (re)issue the
    /// certificate (automatic mode only).
    pub async fn force_renewal(&self) -> Result<()> {
        let CertMode::Automatic(config) = &self.mode else {
            return Ok(());
        };
        let acme = self.acme.as_ref().expect("automatic mode always carries an AcmeClient");

        let issued = acme
            .issue(&config.primary_domain, &config.additional_sans, &config.email)
            .await?;

        std::fs::create_dir_all(&config.certs_dir).map_err(|e| SecurityError::CertIo(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&config.certs_dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| SecurityError::CertIo(e.to_string()))?;
        }

        let cert_path = config.certs_dir.join(format!("{}.pem", config.primary_domain));
        let key_path = config.certs_dir.join(format!("{}.key", config.primary_domain));
        std::fs::write(&cert_path, &issued.cert_pem).map_err(|e| SecurityError::CertIo(e.to_string()))?;
        std::fs::write(&key_path, &issued.key_pem).map_err(|e| SecurityError::CertIo(e.to_string()))?;

        let cert_chain = parse_pem_chain(&issued.cert_pem)?;
        *self.loaded.write() = Some(Loaded {
            cert_chain,
            not_after: issued.not_after,
            issuer_cn: issued.issuer_cn,
            last_renewal: Some(Utc::now()),
        });
        info!(domain = config.primary_domain, "certificate (re)issued via ACME");
        Ok(())
    }

    /// Builds a `rustls::ServerConfig` for the loaded material, honoring
    /// the configured minimum TLS version and client-auth policy
    /// (manual mode only).
    pub fn tls_server_config(&self) -> Result<ServerConfig> {
        let CertMode::Manual(config) = &self.mode else {
            return Err(SecurityError::CertIo("no manual TLS material in automatic mode".into()));
        };
        let guard = self.loaded.read();
        let loaded = guard.as_ref().ok_or_else(|| SecurityError::CertIo("certificate not loaded".into()))?;
        let key = load_private_key(&config.key_path)?;

        let versions: &[&'static rustls::SupportedProtocolVersion] = match config.min_version {
            TlsMinVersion::V1_2 => &[&rustls::version::TLS12, &rustls::version::TLS13],
            TlsMinVersion::V1_3 => &[&rustls::version::TLS13],
        };
        let builder = ServerConfig::builder_with_protocol_versions(versions);

        let built = match config.client_auth {
            ClientAuthPolicy::None => builder
                .with_no_client_auth()
                .with_single_cert(loaded.cert_chain.clone(), key)
                .map_err(|e| SecurityError::CertParse(e.to_string()))?,
            ClientAuthPolicy::Request | ClientAuthPolicy::Require => {
                let ca_path = config
                    .ca_bundle_path
                    .as_ref()
                    .ok_or_else(|| SecurityError::CertIo("client_auth requires ca_bundle_path".into()))?;
                let ca_bytes = std::fs::read(ca_path).map_err(|e| SecurityError::CertIo(e.to_string()))?;
                let mut roots = RootCertStore::empty();
                for cert in parse_pem_chain(&ca_bytes)? {
                    roots.add(cert).map_err(|e| SecurityError::CertParse(e.to_string()))?;
                }
                let mut verifier_builder = WebPkiClientVerifier::builder(Arc::new(roots));
                if matches!(config.client_auth, ClientAuthPolicy::Request) {
                    verifier_builder = verifier_builder.allow_unauthenticated();
                }
                let verifier = verifier_builder.build().map_err(|e| SecurityError::CertParse(e.to_string()))?;
                builder
                    .with_client_cert_verifier(verifier)
                    .with_single_cert(loaded.cert_chain.clone(), key)
                    .map_err(|e| SecurityError::CertParse(e.to_string()))?
            }
        };
        Ok(built)
    }

    pub fn status(&self) -> CertStatus {
        let guard = self.loaded.read();
        let (mode, enabled) = match &self.mode {
            CertMode::Manual(_) => ("manual", true),
            CertMode::Automatic(_) => ("automatic", true),
        };
        let domains = match &self.mode {
            CertMode::Manual(_) => Vec::new(),
            CertMode::Automatic(config) => {
                let mut domains = vec![config.primary_domain.clone()];
                domains.extend(config.additional_sans.clone());
                domains
            }
        };
        match guard.as_ref() {
            Some(loaded) => CertStatus {
                enabled,
                mode,
                domains,
                expiry: Some(loaded.not_after),
                issuer: Some(loaded.issuer_cn.clone()),
                auto_renewal: matches!(self.mode, CertMode::Automatic(_)),
                last_renewal: loaded.last_renewal,
                next_renewal: Some(loaded.not_after - chrono::Duration::days(30)),
                valid: Utc::now() < loaded.not_after,
            },
            None => CertStatus {
                enabled,
                mode,
                domains,
                expiry: None,
                issuer: None,
                auto_renewal: matches!(self.mode, CertMode::Automatic(_)),
                last_renewal: None,
                next_renewal: None,
                valid: false,
            },
        }
    }
}

fn load_from_disk(config: &ManualConfig) -> Result<Loaded> {
    let cert_bytes = std::fs::read(&config.cert_path).map_err(|e| SecurityError::CertIo(e.to_string()))?;
    let cert_chain = parse_pem_chain(&cert_bytes)?;

    let (_, x509) = X509Certificate::from_der(&cert_chain[0])
        .map_err(|e| SecurityError::CertParse(e.to_string()))?;
    let not_after = x509_time_to_chrono(x509.validity().not_after)?;
    let issuer_cn = x509
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("unknown")
        .to_string();

    Ok(Loaded { cert_chain, not_after, issuer_cn, last_renewal: None })
}

fn parse_pem_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SecurityError::CertParse(e.to_string()))
}

fn load_private_key(path: &std::path::Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|e| SecurityError::CertIo(e.to_string()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| SecurityError::CertParse(e.to_string()))?
        .ok_or_else(|| SecurityError::CertParse("no private key found".into()))
}

fn x509_time_to_chrono(time: x509_parser::time::ASN1Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| SecurityError::CertParse("invalid NotAfter".into()))
}
