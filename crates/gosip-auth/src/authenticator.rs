//! The digest authenticator, per spec.md §4.1.

use std::sync::Arc;
use std::time::Duration;

use gosip_sip::digest::DigestParams;
use gosip_sip::message::{Method, Request};
use tracing::{debug, warn};

use crate::device::{Device, DeviceStore};
use crate::error::{AuthError, Result};
use crate::nonce::{Nonce, NonceTable};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct DigestAuthenticator {
    nonces: Arc<NonceTable>,
    devices: Arc<dyn DeviceStore>,
}

impl DigestAuthenticator {
    pub fn new(devices: Arc<dyn DeviceStore>) -> Self {
        Self {
            nonces: Arc::new(NonceTable::new()),
            devices,
        }
    }

    pub fn generate_nonce(&self) -> Nonce {
        self.nonces.generate()
    }

    pub fn validate_nonce(&self, token: &str) -> bool {
        self.nonces.validate(token)
    }

    /// Extracts and verifies `Authorization: Digest ...` credentials on
    /// `request`, returning the authenticated device on success.
    pub async fn authenticate(&self, request: &Request) -> Result<Device> {
        let header = request
            .headers
            .header("authorization")
            .ok_or(AuthError::NoCredentials)?;

        let params = DigestParams::parse(header);
        if !params.has_required_fields() {
            return Err(AuthError::BadRequest(
                "missing required digest parameter".into(),
            ));
        }

        let nonce = params.nonce().unwrap();
        if !self.nonces.validate(nonce) {
            warn!(nonce, "digest auth rejected: invalid or expired nonce");
            return Err(AuthError::InvalidNonce);
        }

        let username = params.username().unwrap();
        let device = self
            .devices
            .find_by_username(username)
            .await?
            .ok_or_else(|| AuthError::DeviceNotFound(username.to_string()))?;

        let expected = expected_response(
            &device.ha1,
            nonce,
            &method_name(request),
            params.uri().unwrap(),
        );

        if !constant_time_eq(&expected, params.response().unwrap()) {
            warn!(username, "digest auth rejected: response mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        // One-shot: only burn the nonce once the request has fully
        // succeeded, so a wrong response or unknown user doesn't cost
        // the caller a round-trip to fetch a fresh one.
        self.nonces.consume(nonce);
        debug!(username, device_id = device.id, "digest auth succeeded");
        Ok(device)
    }

    /// Background task sweeping nonces older than 5 minutes every 60s,
    /// per spec.md §4.1. Runs until `shutdown` resolves.
    pub async fn run_nonce_gc(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = self.nonces.sweep_expired();
                    if swept > 0 {
                        debug!(swept, "swept expired nonces");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

fn method_name(request: &Request) -> String {
    match request.method {
        Method::Register => "REGISTER".to_string(),
        Method::Invite => "INVITE".to_string(),
        other => other.to_string(),
    }
}

/// `response = MD5(HA1 : nonce : MD5(method:uri))`.
fn expected_response(ha1: &str, nonce: &str, method: &str, uri: &str) -> String {
    let ha2 = format!("{:x}", md5::compute(format!("{method}:{uri}")));
    format!("{:x}", md5::compute(format!("{ha1}:{nonce}:{ha2}")))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
