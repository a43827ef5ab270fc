//! Audio layer: PCM codec, microphone capture, and gapless playback.
//!
//! The capture and playback devices run on real-time threads owned by the
//! platform audio host; they exchange data with the async core only
//! through queues, never by blocking the audio callback.

pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{AudioSource, CpalSourceOpener, Microphone, MicrophoneConfig, SourceOpener};
pub use codec::{CodecError, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
pub use playback::{
    AudioSink, ManualClock, OutputContext, PlaybackClock, PlaybackScheduler, PlaybackUnit,
};
