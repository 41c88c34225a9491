//! PCM transport encoding
//!
//! The realtime connection carries raw audio as base64 text (standard
//! alphabet, no line wrapping) inside JSON frames. These helpers convert
//! between i16 sample buffers, little-endian PCM bytes, and the transport
//! encoding. All functions are pure.

use anyhow::{Context, Result};
use base64::Engine;

/// Encode PCM bytes for transport.
pub fn encode_pcm(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a transport-encoded audio payload back into PCM bytes.
pub fn decode_pcm(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("Failed to decode base64 audio payload")
}

/// Flatten i16 samples into little-endian PCM bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reassemble i16 samples from little-endian PCM bytes.
///
/// A trailing odd byte (half a sample) is discarded.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
