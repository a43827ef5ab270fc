//! PCM codec: float samples ↔ 16-bit little-endian PCM ↔ base64 transport.
//!
//! The streaming backend carries audio as base64-encoded PCM16LE inside
//! JSON frames: 16 kHz mono on the way in, 24 kHz mono on the way out.
//!
//! Encoding clamps out-of-range samples to the i16 range rather than
//! truncating. Truncation wraps clipped input (+1.0 becomes -32768),
//! which is audible as a full-scale click; clamping trades that for
//! ordinary flat-top clipping.

use base64::Engine;
use thiserror::Error;

/// Sample rate of microphone audio sent to the backend.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized audio received from the backend.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Errors from decoding an inbound audio payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The transport encoding was not valid base64.
    #[error("invalid transport encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The byte length is not a whole number of sample frames.
    #[error("PCM payload of {len} bytes is not a multiple of {expected} (2 bytes x {channels} channels)")]
    TruncatedFrame {
        len: usize,
        channels: u16,
        expected: usize,
    },
}

/// Convert float samples in `[-1, 1]` to raw PCM16LE bytes.
///
/// Values outside the range are clamped; see the module docs for why.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let scaled = (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&scaled.to_le_bytes());
    }
    bytes
}

/// Encode float samples as base64 PCM16LE, ready for the wire.
pub fn encode_chunk(samples: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(encode_pcm16(samples))
}

/// Decode raw PCM16LE bytes into mono float samples.
///
/// Fails if the byte length is odd.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::TruncatedFrame {
            len: bytes.len(),
            channels: 1,
            expected: 2,
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

/// Decode a base64 PCM16LE payload into per-channel (planar) float buffers.
///
/// Interleaved input is de-interleaved by channel. Fails with
/// [`CodecError::TruncatedFrame`] if the decoded byte length is not a
/// multiple of `2 * channels`.
pub fn decode_chunk(encoded: &str, channels: u16) -> Result<Vec<Vec<f32>>, CodecError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let frame_bytes = 2 * channels as usize;
    if frame_bytes == 0 || bytes.len() % frame_bytes != 0 {
        return Err(CodecError::TruncatedFrame {
            len: bytes.len(),
            channels,
            expected: frame_bytes,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut planes = vec![Vec::with_capacity(frames); channels as usize];
    for frame in bytes.chunks_exact(frame_bytes) {
        for (ch, b) in frame.chunks_exact(2).enumerate() {
            planes[ch].push(i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0);
        }
    }
    Ok(planes)
}

// ── Tests ──────────────────────────────────────────────────────────
