//! Streaming session lifecycle and event pump.
//!
//! ```text
//! Microphone ──frames──▸ uplink ──PCM──▸ Live backend
//!                                            │ events
//! Playback ◂──samples── downlink ◂───────────┘
//!    ▲                     │
//!    └── interrupt ──── transcripts / history
//! ```
//!
//! A session moves `Idle → Connecting → Open → Closing → Idle`, with
//! `Errored` absorbing failures until the next stop. Start and stop are
//! idempotent; a stop that races a still-connecting start wins via an
//! epoch counter that marks the late completion as stale.

pub mod backend;
pub mod events;
pub mod live;

pub use backend::{LiveBackend, LiveConnection, OutboundFrame};
pub use events::LiveEvent;
pub use live::GeminiLive;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::capture::{AudioSource, MicrophoneConfig, SourceOpener};
use crate::audio::codec;
use crate::audio::playback::PlaybackScheduler;
use crate::config::TranslatorConfig;
use crate::error::TranslateError;
use crate::history::ConversationLog;

// ── State ──────────────────────────────────────────────────────────

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running.
    Idle,
    /// Microphone acquired, backend handshake in flight.
    Connecting,
    /// Streaming both directions.
    Open,
    /// Teardown in progress.
    Closing,
    /// A failure occurred; absorbed until the next stop.
    Errored,
}

/// Transcript buffers for the turn currently in progress. Fragments
/// accumulate; the UI renders the full accumulated value each time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTranscripts {
    /// What the speaker has said so far, in the source language.
    pub input: String,
    /// The translation spoken so far, in the target language.
    pub output: String,
}

struct Shared {
    state: Mutex<SessionState>,
    transcripts: Mutex<LiveTranscripts>,
    last_error: Mutex<Option<String>>,
    /// Bumped on every start and stop; tasks and in-flight connects
    /// compare against it and stand down when stale.
    epoch: AtomicU64,
    frames_sent: AtomicU64,
    audio_chunks: AtomicU64,
    turns: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            transcripts: Mutex::new(LiveTranscripts::default()),
            last_error: Mutex::new(None),
            epoch: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            audio_chunks: AtomicU64::new(0),
            turns: AtomicU64::new(0),
        }
    }

    fn fail(&self, message: String) {
        let mut state = self.state.lock();
        if !matches!(*state, SessionState::Closing | SessionState::Idle) {
            *state = SessionState::Errored;
            *self.last_error.lock() = Some(message);
        }
    }
}

/// Resources owned by a running session, released on stop.
struct Active {
    source: Arc<dyn AudioSource>,
    outbound: mpsc::Sender<OutboundFrame>,
    tasks: Vec<JoinHandle<()>>,
}

// ── Session ────────────────────────────────────────────────────────

/// One translation session: a microphone, a live connection, and the
/// pump tasks between them.
pub struct Session {
    id: String,
    shared: Arc<Shared>,
    backend: Arc<dyn LiveBackend>,
    opener: Arc<dyn SourceOpener>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    log: Arc<ConversationLog>,
    active: TokioMutex<Option<Active>>,
}

impl Session {
    pub fn new(
        backend: Arc<dyn LiveBackend>,
        opener: Arc<dyn SourceOpener>,
        scheduler: Arc<Mutex<PlaybackScheduler>>,
        log: Arc<ConversationLog>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            shared: Arc::new(Shared::new()),
            backend,
            opener,
            scheduler,
            log,
            active: TokioMutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Current-turn transcript buffers.
    pub fn transcripts(&self) -> LiveTranscripts {
        self.shared.transcripts.lock().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent.load(Ordering::Relaxed)
    }

    pub fn audio_chunks_received(&self) -> u64 {
        self.shared.audio_chunks.load(Ordering::Relaxed)
    }

    pub fn turns_completed(&self) -> u64 {
        self.shared.turns.load(Ordering::Relaxed)
    }

    /// Start streaming. A no-op when the session is not idle.
    ///
    /// The microphone is acquired before the network handshake so
    /// permission failures surface immediately and without a connection
    /// attempt. Frames captured while still connecting are discarded.
    pub async fn start(&self, config: &TranslatorConfig) -> Result<(), TranslateError> {
        {
            let mut state = self.shared.state.lock();
            if *state != SessionState::Idle {
                tracing::debug!(session_id = %self.id, state = ?*state, "Start ignored: not idle");
                return Ok(());
            }
            *state = SessionState::Connecting;
        }
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.last_error.lock() = None;
        *self.shared.transcripts.lock() = LiveTranscripts::default();

        tracing::info!(
            session_id = %self.id,
            source = config.source.label(),
            target = config.target.label(),
            "Starting session"
        );

        let source = match self.opener.open(&MicrophoneConfig::default()) {
            Ok(source) => source,
            Err(e) => {
                self.shared.fail(e.to_string());
                return Err(e);
            }
        };

        let connection = match self.backend.connect(&self.id, config).await {
            Ok(connection) => connection,
            Err(e) => {
                source.close();
                self.shared.fail(e.to_string());
                return Err(e);
            }
        };

        // Holding the active slot serializes the final wiring against
        // stop(); an epoch mismatch here means a stop arrived while the
        // handshake was in flight and this completion is stale.
        let mut active = self.active.lock().await;
        if self.shared.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(session_id = %self.id, "Connect completed after stop, discarding");
            connection.close().await;
            source.close();
            return Ok(());
        }

        source.discard_pending();
        *self.shared.state.lock() = SessionState::Open;

        let (outbound, events) = connection.split();
        let tasks = vec![
            tokio::spawn(uplink(
                Arc::clone(&source),
                outbound.clone(),
                Arc::clone(&self.shared),
                self.id.clone(),
            )),
            tokio::spawn(downlink(
                events,
                Arc::clone(&source),
                outbound.clone(),
                Arc::clone(&self.shared),
                Arc::clone(&self.scheduler),
                Arc::clone(&self.log),
                config.source.label().to_string(),
                self.id.clone(),
                epoch,
            )),
        ];

        *active = Some(Active {
            source,
            outbound,
            tasks,
        });
        tracing::info!(session_id = %self.id, "Session open");
        Ok(())
    }

    /// Stop streaming and release the microphone. Idempotent: stopping
    /// an idle session does nothing; stopping twice is safe. Also the
    /// way out of [`SessionState::Errored`].
    pub async fn stop(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock().await;
        {
            let mut state = self.shared.state.lock();
            if *state == SessionState::Idle {
                return;
            }
            *state = SessionState::Closing;
        }

        if let Some(active) = active.take() {
            active.source.close();
            let _ = active.outbound.send(OutboundFrame::Close).await;
            for task in active.tasks {
                task.abort();
            }
        }

        self.scheduler.lock().interrupt();
        *self.shared.transcripts.lock() = LiveTranscripts::default();
        *self.shared.state.lock() = SessionState::Idle;
        tracing::info!(session_id = %self.id, "Session stopped");
    }
}

// ── Pump tasks ─────────────────────────────────────────────────────

/// Microphone frames → PCM16LE → backend.
async fn uplink(
    source: Arc<dyn AudioSource>,
    outbound: mpsc::Sender<OutboundFrame>,
    shared: Arc<Shared>,
    session_id: String,
) {
    while let Some(frame) = source.next_frame().await {
        let pcm = codec::encode_pcm16(&frame);
        if outbound.send(OutboundFrame::Audio(pcm)).await.is_err() {
            break;
        }
        shared.frames_sent.fetch_add(1, Ordering::Relaxed);
    }
    // Microphone gone; let the backend flush whatever it buffered.
    let _ = outbound.send(OutboundFrame::AudioStreamEnd).await;
    tracing::debug!(session_id = %session_id, "Uplink terminated");
}

/// Backend events → playback, transcripts, and history.
#[allow(clippy::too_many_arguments)]
async fn downlink(
    mut events: mpsc::Receiver<LiveEvent>,
    source: Arc<dyn AudioSource>,
    outbound: mpsc::Sender<OutboundFrame>,
    shared: Arc<Shared>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    log: Arc<ConversationLog>,
    source_label: String,
    session_id: String,
    epoch: u64,
) {
    while let Some(event) = events.recv().await {
        let stale = shared.epoch.load(Ordering::SeqCst) != epoch;
        match event {
            LiveEvent::SetupComplete => {}
            LiveEvent::Audio { data } => {
                if stale {
                    continue;
                }
                match codec::decode_pcm16(&data) {
                    Ok(samples) => {
                        scheduler.lock().enqueue(&samples);
                        shared.audio_chunks.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "Dropping undecodable audio chunk"
                        );
                    }
                }
            }
            LiveEvent::InputTranscript { text } => {
                if !stale {
                    shared.transcripts.lock().input.push_str(&text);
                }
            }
            LiveEvent::OutputTranscript { text } => {
                if !stale {
                    shared.transcripts.lock().output.push_str(&text);
                }
            }
            LiveEvent::TurnComplete => {
                if stale {
                    continue;
                }
                shared.turns.fetch_add(1, Ordering::Relaxed);
                let finished = std::mem::take(&mut *shared.transcripts.lock());
                let recorded = log.record_turn(&source_label, &finished.input, &finished.output);
                tracing::info!(
                    session_id = %session_id,
                    recorded,
                    "Turn finished"
                );
            }
            LiveEvent::Interrupted => {
                if stale {
                    continue;
                }
                // The speaker talked over the model: cancel playback
                // and drop the half-spoken translation. Their own
                // transcript keeps accumulating.
                scheduler.lock().interrupt();
                shared.transcripts.lock().output.clear();
            }
            LiveEvent::Error { message } => {
                if !stale {
                    shared.fail(message);
                    // Mirror stop(): microphone first, then transport.
                    source.close();
                    let _ = outbound.send(OutboundFrame::Close).await;
                }
            }
            LiveEvent::Closed => {
                if !stale {
                    shared.fail("connection closed unexpectedly".into());
                    source.close();
                    let _ = outbound.send(OutboundFrame::Close).await;
                }
                break;
            }
        }
    }
    tracing::debug!(session_id = %session_id, "Downlink terminated");
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{encode_pcm16, OUTPUT_SAMPLE_RATE};
    use crate::audio::playback::{AudioSink, ManualClock};
    use crate::config::{Language, SourceLanguage};
    use async_trait::async_trait;
    use std::time::Duration;

    // ── Test doubles ──────────────────────────────────────────────

    struct NullSink;

    impl AudioSink for NullSink {
        fn schedule(&mut self, _at_secs: f64, _samples: &[f32]) {}
        fn clear(&mut self) {}
    }

    /// Backend that replays a scripted event sequence and records
    /// every outbound frame.
    struct ScriptedBackend {
        script: Mutex<Vec<LiveEvent>>,
        sent: Arc<Mutex<Vec<OutboundFrame>>>,
        connects: AtomicU64,
        /// Keeps the event channel open after the script runs out.
        holder: Mutex<Option<mpsc::Sender<LiveEvent>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<LiveEvent>) -> Self {
            Self {
                script: Mutex::new(script),
                sent: Arc::new(Mutex::new(Vec::new())),
                connects: AtomicU64::new(0),
                holder: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LiveBackend for ScriptedBackend {
        async fn connect(
            &self,
            _session_id: &str,
            _config: &TranslatorConfig,
        ) -> Result<LiveConnection, TranslateError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
            let (event_tx, event_rx) = mpsc::channel(64);

            let sent = Arc::clone(&self.sent);
            tokio::spawn(async move {
                while let Some(frame) = outbound_rx.recv().await {
                    sent.lock().push(frame);
                }
            });

            let script = std::mem::take(&mut *self.script.lock());
            *self.holder.lock() = Some(event_tx.clone());
            tokio::spawn(async move {
                for event in script {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
            });

            Ok(LiveConnection::new(outbound_tx, event_rx))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl LiveBackend for FailingBackend {
        async fn connect(
            &self,
            _session_id: &str,
            _config: &TranslatorConfig,
        ) -> Result<LiveConnection, TranslateError> {
            Err(TranslateError::ConnectionFailed("refused".into()))
        }
    }

    /// Scripted microphone: yields the given frames, then blocks until
    /// closed.
    struct MockSource {
        rx: TokioMutex<mpsc::UnboundedReceiver<Vec<f32>>>,
        tx: Mutex<Option<mpsc::UnboundedSender<Vec<f32>>>>,
    }

    impl MockSource {
        fn new(frames: Vec<Vec<f32>>, keep_open: bool) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            for frame in frames {
                tx.send(frame).unwrap();
            }
            Self {
                rx: TokioMutex::new(rx),
                tx: Mutex::new(keep_open.then_some(tx)),
            }
        }
    }

    #[async_trait]
    impl AudioSource for MockSource {
        async fn next_frame(&self) -> Option<Vec<f32>> {
            self.rx.lock().await.recv().await
        }
        fn close(&self) {
            self.tx.lock().take();
        }
    }

    struct MockOpener {
        frames: Mutex<Vec<Vec<f32>>>,
        keep_open: bool,
    }

    impl MockOpener {
        fn silent() -> Self {
            Self {
                frames: Mutex::new(Vec::new()),
                keep_open: true,
            }
        }

        fn with_frames(frames: Vec<Vec<f32>>) -> Self {
            Self {
                frames: Mutex::new(frames),
                keep_open: false,
            }
        }
    }

    impl SourceOpener for MockOpener {
        fn open(&self, _config: &MicrophoneConfig) -> Result<Arc<dyn AudioSource>, TranslateError> {
            Ok(Arc::new(MockSource::new(
                std::mem::take(&mut *self.frames.lock()),
                self.keep_open,
            )))
        }
    }

    struct DeniedOpener;

    impl SourceOpener for DeniedOpener {
        fn open(&self, _config: &MicrophoneConfig) -> Result<Arc<dyn AudioSource>, TranslateError> {
            Err(TranslateError::PermissionDenied)
        }
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn test_config() -> TranslatorConfig {
        TranslatorConfig {
            source: SourceLanguage::Fixed(Language::En),
            target: Language::Es,
            ..Default::default()
        }
    }

    fn test_scheduler(clock: ManualClock) -> Arc<Mutex<PlaybackScheduler>> {
        Arc::new(Mutex::new(PlaybackScheduler::new(
            Arc::new(clock),
            Box::new(NullSink),
            OUTPUT_SAMPLE_RATE,
        )))
    }

    fn session_with(
        backend: Arc<dyn LiveBackend>,
        opener: Arc<dyn SourceOpener>,
    ) -> (Session, Arc<Mutex<PlaybackScheduler>>, Arc<ConversationLog>) {
        let scheduler = test_scheduler(ManualClock::new());
        let log = Arc::new(ConversationLog::new());
        let session = Session::new(backend, opener, Arc::clone(&scheduler), Arc::clone(&log));
        (session, scheduler, log)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    fn audio_event(samples: usize) -> LiveEvent {
        LiveEvent::Audio {
            data: encode_pcm16(&vec![0.1f32; samples]),
        }
    }

    // ── Scenarios ─────────────────────────────────────────────────

    #[tokio::test]
    async fn full_turn_records_history_and_schedules_audio() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            LiveEvent::InputTranscript {
                text: "Hello".into(),
            },
            audio_event(2400),
            LiveEvent::OutputTranscript {
                text: "Hola".into(),
            },
            LiveEvent::TurnComplete,
        ]));
        let (session, scheduler, log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        assert_eq!(session.state(), SessionState::Open);

        wait_until(|| log.len() == 1).await;
        let entries = log.entries();
        assert_eq!(entries[0].source_text, "Hello");
        assert_eq!(entries[0].translated_text, "Hola");
        assert_eq!(entries[0].source_label, "English");

        // Clock never advanced, so the scheduled chunk is still active.
        assert_eq!(scheduler.lock().active_units(), 1);
        assert_eq!(session.audio_chunks_received(), 1);
        // Turn buffers reset for the next utterance.
        assert_eq!(session.transcripts(), LiveTranscripts::default());

        session.stop().await;
    }

    #[tokio::test]
    async fn interrupt_cancels_playback_and_stale_translation() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            LiveEvent::OutputTranscript {
                text: "Hola, ¿cómo".into(),
            },
            audio_event(2400),
            audio_event(2400),
            LiveEvent::Interrupted,
        ]));
        let (session, scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        wait_until(|| {
            session.audio_chunks_received() == 2 && scheduler.lock().active_units() == 0
        })
        .await;

        assert!(session.transcripts().output.is_empty());
        assert_eq!(session.state(), SessionState::Open);
        session.stop().await;
    }

    #[tokio::test]
    async fn permission_denied_sets_errored_without_connecting() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(DeniedOpener));

        let err = session.start(&test_config()).await.unwrap_err();
        assert!(matches!(err, TranslateError::PermissionDenied));
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(backend.connects.load(Ordering::SeqCst), 0);

        // Stop clears the error state.
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn connect_failure_sets_errored() {
        let (session, _scheduler, _log) =
            session_with(Arc::new(FailingBackend), Arc::new(MockOpener::silent()));

        let err = session.start(&test_config()).await.unwrap_err();
        assert!(matches!(err, TranslateError::ConnectionFailed(_)));
        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.last_error().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn start_while_open_is_a_noop() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        session.start(&test_config()).await.unwrap();
        assert_eq!(backend.connects.load(Ordering::SeqCst), 1);
        session.stop().await;
    }

    #[tokio::test]
    async fn session_can_restart_after_stop() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        session.stop().await;
        session.start(&test_config()).await.unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(backend.connects.load(Ordering::SeqCst), 2);
        session.stop().await;
    }

    #[tokio::test]
    async fn turn_without_both_transcripts_records_nothing() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            audio_event(2400),
            LiveEvent::TurnComplete,
        ]));
        let (session, _scheduler, log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        wait_until(|| session.turns_completed() == 1).await;
        assert!(log.is_empty());
        session.stop().await;
    }

    #[tokio::test]
    async fn server_error_moves_session_to_errored() {
        let backend = Arc::new(ScriptedBackend::new(vec![LiveEvent::Error {
            message: "quota exceeded".into(),
        }]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        wait_until(|| session.state() == SessionState::Errored).await;
        assert!(session.last_error().unwrap().contains("quota"));
        // The transport is released too, not just the microphone.
        wait_until(|| {
            backend
                .sent
                .lock()
                .iter()
                .any(|f| matches!(f, OutboundFrame::Close))
        })
        .await;
        session.stop().await;
    }

    #[tokio::test]
    async fn unexpected_close_moves_session_to_errored() {
        let backend = Arc::new(ScriptedBackend::new(vec![LiveEvent::Closed]));
        let (session, _scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        wait_until(|| session.state() == SessionState::Errored).await;
        wait_until(|| {
            backend
                .sent
                .lock()
                .iter()
                .any(|f| matches!(f, OutboundFrame::Close))
        })
        .await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn microphone_frames_are_encoded_and_sent() {
        let frames = vec![vec![0.5f32; 8], vec![-0.5f32; 8]];
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let (session, _scheduler, _log) = session_with(
            Arc::clone(&backend) as _,
            Arc::new(MockOpener::with_frames(frames.clone())),
        );

        session.start(&test_config()).await.unwrap();
        wait_until(|| session.frames_sent() == 2).await;

        // The mock source runs dry, so the uplink signals end-of-stream.
        wait_until(|| {
            backend
                .sent
                .lock()
                .iter()
                .any(|f| matches!(f, OutboundFrame::AudioStreamEnd))
        })
        .await;

        let sent = backend.sent.lock();
        let audio: Vec<_> = sent
            .iter()
            .filter_map(|f| match f {
                OutboundFrame::Audio(pcm) => Some(pcm.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(audio, vec![encode_pcm16(&frames[0]), encode_pcm16(&frames[1])]);
        drop(sent);
        session.stop().await;
    }

    #[tokio::test]
    async fn stop_interrupts_playback() {
        let backend = Arc::new(ScriptedBackend::new(vec![audio_event(4800)]));
        let (session, scheduler, _log) =
            session_with(Arc::clone(&backend) as _, Arc::new(MockOpener::silent()));

        session.start(&test_config()).await.unwrap();
        wait_until(|| session.audio_chunks_received() == 1).await;
        assert_eq!(scheduler.lock().active_units(), 1);

        session.stop().await;
        assert_eq!(scheduler.lock().active_units(), 0);
    }
}
