//! Audio source loading, per spec.md §4.7: WAV files skip the 44-byte
//! header; a failed load synthesises 1s of PCMU silence.

use crate::error::{MohError, Result};
use std::path::Path;

const WAV_HEADER_LEN: usize = 44;
const SILENCE_BYTES: usize = 8000; // 1s @ 8kHz, 1 byte/sample
const SILENCE_BYTE: u8 = 0xFF;

/// Loads a WAV file and strips its 44-byte header, leaving raw PCMU
/// samples. Returns the synthesised silence buffer if the file cannot be
/// read or is shorter than the header.
pub fn load(path: &Path) -> Vec<u8> {
    match try_load(path) {
        Ok(samples) => samples,
        Err(_) => synth_silence(),
    }
}

fn try_load(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| MohError::SourceLoad(e.to_string()))?;
    if bytes.len() <= WAV_HEADER_LEN {
        return Err(MohError::SourceLoad("file shorter than WAV header".into()));
    }
    Ok(bytes[WAV_HEADER_LEN..].to_vec())
}

pub fn synth_silence() -> Vec<u8> {
    vec![SILENCE_BYTE; SILENCE_BYTES]
}
