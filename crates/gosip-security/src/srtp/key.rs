//! SRTP master key/salt material, per spec.md §4.10.

use rand::RngCore;

use crate::srtp::profile::SrtpProfile;

/// Master Key Identifier, carried as the optional `|MKI:len` suffix on
/// an `a=crypto` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mki {
    pub value: u32,
    pub len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtpKeyMaterial {
    pub key: Vec<u8>,
    pub salt: Vec<u8>,
    pub lifetime: Option<String>,
    pub mki: Option<Mki>,
}

/// Draws both key and salt from a cryptographically secure RNG.
pub fn generate_key_material(profile: SrtpProfile) -> SrtpKeyMaterial {
    let mut key = vec![0u8; profile.key_len()];
    let mut salt = vec![0u8; profile.salt_len()];
    rand::thread_rng().fill_bytes(&mut key);
    rand::thread_rng().fill_bytes(&mut salt);
    SrtpKeyMaterial { key, salt, lifetime: None, mki: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_material_matches_profile_sizes() {
        let material = generate_key_material(SrtpProfile::AeadAes256Gcm);
        assert_eq!(material.key.len(), 32);
        assert_eq!(material.salt.len(), 12);
    }
}
