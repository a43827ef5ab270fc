//! Error taxonomy for the translator core.
//!
//! Device, permission, and connection errors are caught at the session
//! boundary, mapped to a single user-visible `Error` status, and trigger
//! full teardown — never an automatic retry. Codec errors on individual
//! inbound chunks are logged and the chunk dropped; one corrupt chunk
//! must not kill an otherwise-healthy stream.

use thiserror::Error;

use crate::audio::codec::CodecError;

/// Top-level error type for the translator core.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Microphone access was refused by the platform.
    #[error("microphone access denied")]
    PermissionDenied,

    /// No capture/playback device, or no workable device configuration.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// WebSocket handshake or mid-stream transport failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed audio payload.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The host platform lacks a required capability
    /// (e.g. the local speech recognition/synthesis mode).
    #[error("platform capability missing: {0}")]
    UnsupportedPlatform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            TranslateError::PermissionDenied.to_string(),
            "microphone access denied"
        );
        assert!(TranslateError::DeviceUnavailable("no input device".into())
            .to_string()
            .contains("no input device"));
        assert!(TranslateError::ConnectionFailed("handshake timeout".into())
            .to_string()
            .contains("handshake"));
    }

    #[test]
    fn codec_error_converts() {
        let err: TranslateError = CodecError::TruncatedFrame {
            len: 3,
            channels: 1,
            expected: 2,
        }
        .into();
        assert!(matches!(err, TranslateError::Codec(_)));
    }
}
