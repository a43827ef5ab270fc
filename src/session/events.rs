//! Events surfaced by a live translation connection.
//!
//! The wire client decodes every server frame into a flat stream of
//! these events; the session pump is the single consumer and never sees
//! raw JSON.

/// One event decoded from the streaming backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The backend acknowledged the setup message; audio may flow.
    SetupComplete,

    /// A chunk of synthesized translation audio (raw PCM16LE, 24 kHz mono).
    Audio { data: Vec<u8> },

    /// Transcript fragment of what the speaker said, in the source language.
    InputTranscript { text: String },

    /// Transcript fragment of the spoken translation, in the target language.
    OutputTranscript { text: String },

    /// The model finished its response for the current utterance.
    TurnComplete,

    /// The speaker talked over the model; in-flight output is stale.
    Interrupted,

    /// The server reported an error or a frame failed to decode.
    Error { message: String },

    /// The connection closed (gracefully or not). Terminal.
    Closed,
}

impl LiveEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetupComplete => "setup_complete",
            Self::Audio { .. } => "audio",
            Self::InputTranscript { .. } => "input_transcript",
            Self::OutputTranscript { .. } => "output_transcript",
            Self::TurnComplete => "turn_complete",
            Self::Interrupted => "interrupted",
            Self::Error { .. } => "error",
            Self::Closed => "closed",
        }
    }
}
