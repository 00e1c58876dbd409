//! `a=crypto:` line construction and parsing (RFC 4568), per spec.md
//! §4.10.

use base64::Engine;

use crate::error::{Result, SecurityError};
use crate::srtp::key::{Mki, SrtpKeyMaterial};
use crate::srtp::profile::SrtpProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoLine {
    pub tag: u32,
    pub profile: SrtpProfile,
    pub key_material: SrtpKeyMaterial,
}

/// `a=crypto:<tag> <profile> inline:<base64(key||salt)[|lifetime][|MKI:len]> [session-params...]`
pub fn build_crypto_line(tag: u32, profile: SrtpProfile, key_material: &SrtpKeyMaterial) -> String {
    let mut combined = Vec::with_capacity(key_material.key.len() + key_material.salt.len());
    combined.extend_from_slice(&key_material.key);
    combined.extend_from_slice(&key_material.salt);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&combined);

    let mut key_info = format!("inline:{encoded}");
    if let Some(lifetime) = &key_material.lifetime {
        key_info.push('|');
        key_info.push_str(lifetime);
    }
    if let Some(mki) = key_material.mki {
        key_info.push('|');
        key_info.push_str(&format!("{}:{}", mki.value, mki.len));
    }

    format!("a=crypto:{tag} {} {key_info}", profile.sdp_name())
}

/// Tolerant, order-preserving parse: accepts the optional `a=crypto:`
/// prefix, splits on whitespace, validates the integer tag, separates
/// `<method>:<key-info>` on the first colon, splits key-info on `|` and
/// decodes the first piece. Errors if the decoded length is shorter
/// than the profile's key+salt requirement.
pub fn parse_crypto_line(line: &str) -> Result<CryptoLine> {
    let line = line.trim();
    let body = line.strip_prefix("a=crypto:").unwrap_or(line);

    let mut parts = body.split_whitespace();
    let tag: u32 = parts
        .next()
        .ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?
        .parse()
        .map_err(|_| SecurityError::CryptoLineMalformed(line.to_string()))?;

    let profile_name = parts
        .next()
        .ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?;
    let profile = SrtpProfile::parse(profile_name)
        .ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?;

    let key_info_field = parts
        .next()
        .ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?;
    let (_method, key_info) = key_info_field
        .split_once(':')
        .ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?;

    let mut pieces = key_info.split('|');
    let encoded = pieces.next().ok_or_else(|| SecurityError::CryptoLineMalformed(line.to_string()))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| SecurityError::CryptoLineMalformed(e.to_string()))?;

    let need = profile.key_len() + profile.salt_len();
    if decoded.len() < need {
        return Err(SecurityError::KeyMaterialTooShort { need, got: decoded.len() });
    }

    let key = decoded[..profile.key_len()].to_vec();
    let salt = decoded[profile.key_len()..need].to_vec();

    let mut lifetime = None;
    let mut mki = None;
    for piece in pieces {
        if let Some((value, len)) = piece.split_once(':') {
            if let (Ok(value), Ok(len)) = (value.parse(), len.parse()) {
                mki = Some(Mki { value, len });
                continue;
            }
        }
        lifetime = Some(piece.to_string());
    }

    Ok(CryptoLine {
        tag,
        profile,
        key_material: SrtpKeyMaterial { key, salt, lifetime, mki },
    })
}

/// Upgrades the transport token to `RTP/SAVP` and inserts the crypto
/// line immediately after the first `m=audio` line.
pub fn add_crypto_to_sdp(sdp: &str, tag: u32, profile: SrtpProfile, key_material: &SrtpKeyMaterial) -> String {
    let upgraded = gosip_sip::sdp::upgrade_to_savp(sdp);
    let line = build_crypto_line(tag, profile, key_material);
    gosip_sip::sdp::insert_after_first_mline(&upgraded, "audio", &line)
}
