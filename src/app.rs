//! Top-level translator façade: wires devices, session, and history
//! together and derives the one-line status a UI shell displays.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::capture::{CpalSourceOpener, SourceOpener};
use crate::audio::playback::{OutputContext, PlaybackScheduler};
use crate::config::TranslatorConfig;
use crate::error::TranslateError;
use crate::history::{ConversationLog, HistoryEntry};
use crate::session::{GeminiLive, LiveBackend, LiveTranscripts, Session, SessionState};
use crate::translate::TextTranslator;

// ── Status ─────────────────────────────────────────────────────────

/// What the translator is doing right now, for display. Exactly one of
/// five values; the connecting phase reads as `Listening` since the
/// microphone is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No session; ready to start.
    Ready,
    /// Streaming (or connecting), waiting for speech.
    Listening,
    /// A translation is arriving but nothing is playing yet.
    Translating,
    /// Translated audio is playing.
    Speaking,
    /// The session failed; see the error message.
    Error,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Listening => "Listening",
            Self::Translating => "Translating…",
            Self::Speaking => "Speaking",
            Self::Error => "Error",
        }
    }
}

// ── App ────────────────────────────────────────────────────────────

/// The assembled translator. One per process; sessions start and stop
/// within it while the output device stays open throughout.
pub struct TranslatorApp {
    config: Mutex<TranslatorConfig>,
    session: Session,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    log: Arc<ConversationLog>,
    // Keeps the output stream alive across sessions.
    _output: Option<OutputContext>,
}

impl TranslatorApp {
    /// Wire up real devices and the production backend.
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslateError> {
        let output = OutputContext::open()?;
        let scheduler = Arc::new(Mutex::new(output.scheduler()));
        Ok(Self::assemble(
            config,
            Arc::new(GeminiLive),
            Arc::new(CpalSourceOpener),
            scheduler,
            Some(output),
        ))
    }

    /// Wire up with injected backend, capture, and playback. Used by
    /// tests and embedders with their own audio plumbing.
    pub fn with_parts(
        config: TranslatorConfig,
        backend: Arc<dyn LiveBackend>,
        opener: Arc<dyn SourceOpener>,
        scheduler: Arc<Mutex<PlaybackScheduler>>,
    ) -> Self {
        Self::assemble(config, backend, opener, scheduler, None)
    }

    fn assemble(
        config: TranslatorConfig,
        backend: Arc<dyn LiveBackend>,
        opener: Arc<dyn SourceOpener>,
        scheduler: Arc<Mutex<PlaybackScheduler>>,
        output: Option<OutputContext>,
    ) -> Self {
        let log = Arc::new(ConversationLog::new());
        let session = Session::new(backend, opener, Arc::clone(&scheduler), Arc::clone(&log));
        Self {
            config: Mutex::new(config),
            session,
            scheduler,
            log,
            _output: output,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    pub async fn start(&self) -> Result<(), TranslateError> {
        let config = self.config.lock().clone();
        self.session.start(&config).await
    }

    pub async fn stop(&self) {
        self.session.stop().await;
    }

    /// Replace the configuration. A live session is restarted so the
    /// new languages and voice take effect; changes never apply
    /// mid-stream.
    pub async fn set_config(&self, config: TranslatorConfig) -> Result<(), TranslateError> {
        let was_live = !matches!(
            self.session.state(),
            SessionState::Idle | SessionState::Errored
        );
        *self.config.lock() = config;
        if was_live {
            self.session.stop().await;
            self.start().await?;
        }
        Ok(())
    }

    pub fn config(&self) -> TranslatorConfig {
        self.config.lock().clone()
    }

    pub async fn set_source_language(
        &self,
        source: crate::config::SourceLanguage,
    ) -> Result<(), TranslateError> {
        let mut config = self.config();
        config.source = source;
        self.set_config(config).await
    }

    pub async fn set_target_language(
        &self,
        target: crate::config::Language,
    ) -> Result<(), TranslateError> {
        let mut config = self.config();
        config.target = target;
        self.set_config(config).await
    }

    pub async fn set_voice_gender(
        &self,
        voice: crate::config::VoiceGender,
    ) -> Result<(), TranslateError> {
        let mut config = self.config();
        config.voice = voice;
        self.set_config(config).await
    }

    // ── Observation ───────────────────────────────────────────────

    /// Derive the display status from session state, playback, and the
    /// current turn's transcripts.
    pub fn status(&self) -> Status {
        match self.session.state() {
            SessionState::Errored => Status::Error,
            SessionState::Connecting => Status::Listening,
            SessionState::Idle | SessionState::Closing => Status::Ready,
            SessionState::Open => {
                if self.scheduler.lock().is_speaking() {
                    Status::Speaking
                } else if !self.session.transcripts().output.is_empty() {
                    Status::Translating
                } else {
                    Status::Listening
                }
            }
        }
    }

    /// Whether a session is capturing (or about to).
    pub fn is_recording(&self) -> bool {
        matches!(
            self.session.state(),
            SessionState::Connecting | SessionState::Open
        )
    }

    pub fn transcripts(&self) -> LiveTranscripts {
        self.session.transcripts()
    }

    /// What the speaker has said so far this turn.
    pub fn transcript(&self) -> String {
        self.session.transcripts().input
    }

    /// The translation produced so far this turn.
    pub fn translation(&self) -> String {
        self.session.transcripts().output
    }

    pub fn last_error(&self) -> Option<String> {
        self.session.last_error()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.log.entries()
    }

    pub fn clear_history(&self) {
        self.log.clear();
    }

    // ── Text translation ──────────────────────────────────────────

    /// Translate typed text using the current configuration.
    pub async fn translate_text(&self, text: &str) -> Result<String, TranslateError> {
        let (api_key, source, target) = {
            let config = self.config.lock();
            (config.api_key.clone(), config.source, config.target)
        };
        TextTranslator::new(api_key)
            .translate(text, source, target)
            .await
    }

    /// On-device speech recognition is not available in this build;
    /// recognition happens in the streaming backend.
    pub fn start_local_recognition(&self) -> Result<(), TranslateError> {
        Err(TranslateError::UnsupportedPlatform(
            "on-device speech recognition".into(),
        ))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
