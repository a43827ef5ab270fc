//! Real-time speech translation core.
//!
//! Captures microphone audio, streams it to the Gemini Live API, and
//! plays back the spoken translation gaplessly while keeping a log of
//! completed turns.
//!
//! ```text
//! Microphone ─▸ capture ─▸ PCM16LE ─▸ session ─▸ Gemini Live
//!                                        │ events
//! Speaker ◂─ playback ◂─ decode ◂────────┤
//! History ◂─ transcripts ◂───────────────┘
//! ```
//!
//! [`TranslatorApp`] assembles the pieces; the layers underneath are
//! usable on their own:
//!
//! - [`audio`] — PCM codec, microphone capture, playback scheduling
//! - [`session`] — streaming lifecycle and the live wire protocol
//! - [`history`] — the conversation log
//! - [`translate`] — one-shot text translation
//!
//! ```no_run
//! use lingo_live::{Language, SourceLanguage, TranslatorApp, TranslatorConfig};
//!
//! # async fn run() -> Result<(), lingo_live::TranslateError> {
//! let app = TranslatorApp::new(TranslatorConfig {
//!     source: SourceLanguage::Auto,
//!     target: Language::Es,
//!     api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
//!     ..Default::default()
//! })?;
//! app.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod session;
pub mod translate;

pub use app::{Status, TranslatorApp};
pub use config::{Language, SourceLanguage, TranslatorConfig, VoiceGender};
pub use error::TranslateError;
pub use history::{ConversationLog, HistoryEntry};
pub use session::{LiveTranscripts, Session, SessionState};
pub use translate::TextTranslator;
