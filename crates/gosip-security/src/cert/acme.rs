//! ACME is consumed through a trait port rather than a concrete protocol
//! implementation (spec.md §1 Non-goals excludes an ACME client from the
//! core); the server shell supplies a real implementation, and this
//! crate ships an in-memory fake for tests.

use async_trait::async_trait;

use crate::error::Result;

pub struct IssuedCert {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
    pub issuer_cn: String,
    pub not_after: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait AcmeClient: Send + Sync {
    async fn issue(&self, domain: &str, sans: &[String], email: &str) -> Result<IssuedCert>;
}

pub struct FakeAcmeClient {
    pub validity_days: i64,
}

#[async_trait]
impl AcmeClient for FakeAcmeClient {
    async fn issue(&self, domain: &str, _sans: &[String], _email: &str) -> Result<IssuedCert> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![domain.to_string()])
                .map_err(|e| crate::error::SecurityError::AcmeFailed(e.to_string()))?;
        Ok(IssuedCert {
            cert_pem: cert.pem().into_bytes(),
            key_pem: key_pair.serialize_pem().into_bytes(),
            issuer_cn: domain.to_string(),
            not_after: chrono::Utc::now() + chrono::Duration::days(self.validity_days),
        })
    }
}
