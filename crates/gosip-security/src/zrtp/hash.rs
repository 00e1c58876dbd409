//! ZRTP hashing and SAS rendering, per spec.md §4.11.

use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Confusable characters (0, 1, I, O) are omitted from the alphabet.
const SAS_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789=";

/// Base32-encodes `data` with the SAS alphabet, truncated to 4
/// characters by the caller per spec.md §4.11.
pub fn base32_sas(data: &[u8]) -> String {
    let mut bits: u32 = 0;
    let mut bit_count = 0u32;
    let mut out = String::new();
    for &byte in data {
        bits = (bits << 8) | u32::from(byte);
        bit_count += 8;
        while bit_count >= 5 {
            bit_count -= 5;
            let idx = (bits >> bit_count) & 0x1F;
            out.push(SAS_ALPHABET[idx as usize] as char);
        }
    }
    if bit_count > 0 {
        let idx = (bits << (5 - bit_count)) & 0x1F;
        out.push(SAS_ALPHABET[idx as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_32_bytes() {
        assert_eq!(sha256(b"hello").len(), 32);
    }

    #[test]
    fn base32_sas_is_deterministic() {
        let digest = sha256(b"zrtp-test");
        assert_eq!(base32_sas(&digest[..4]), base32_sas(&digest[..4]));
    }

    #[test]
    fn base32_sas_avoids_confusable_characters() {
        for _ in 0..64 {
            let digest = sha256(&rand_like());
            let sas = base32_sas(&digest[..4]);
            assert!(!sas.contains(['0', '1', 'I', 'O']));
        }
    }

    fn rand_like() -> [u8; 8] {
        use rand::RngCore;
        let mut buf = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
    }
}
