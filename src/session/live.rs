//! Gemini Live WebSocket client (BidiGenerateContent).
//!
//! Protocol:
//!
//! 1. **Connect** — open the WebSocket with the API key in the query.
//! 2. **Setup** — send configuration (model, voice, system prompt,
//!    transcription) as the first frame, then wait for `setupComplete`.
//! 3. **Stream** — send microphone PCM as `realtimeInput`, receive
//!    translated audio and transcripts as `serverContent`.
//! 4. **Close** — graceful WebSocket close.
//!
//! The server sends **all** messages as Binary frames, including JSON
//! control messages like `setupComplete`. Frames whose first byte is
//! `{` are parsed as JSON server messages.

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::backend::{LiveBackend, LiveConnection, OutboundFrame};
use super::events::LiveEvent;
use crate::config::TranslatorConfig;
use crate::error::TranslateError;

// ── Constants ──────────────────────────────────────────────────────

/// Gemini Live WebSocket endpoint.
const LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Model used for live audio translation.
const LIVE_MODEL: &str = "gemini-2.0-flash-exp";

/// MIME type for microphone input (16 kHz PCM mono).
const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// How long to wait for `setupComplete` before giving up.
const SETUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

// ── Setup message (JSON sent as first frame) ───────────────────────

#[derive(Debug, Serialize)]
struct SetupMessage {
    setup: SetupPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupPayload {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
    /// Empty object opts in to source-language transcripts.
    input_audio_transcription: serde_json::Value,
    /// Empty object opts in to translation transcripts.
    output_audio_transcription: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

fn build_setup_message(config: &TranslatorConfig) -> SetupMessage {
    SetupMessage {
        setup: SetupPayload {
            model: format!("models/{LIVE_MODEL}"),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice.voice_name().to_string(),
                        },
                    },
                },
            },
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: config.build_system_prompt(),
                }],
            },
            input_audio_transcription: serde_json::json!({}),
            output_audio_transcription: serde_json::json!({}),
        },
    }
}

// ── Audio input message ────────────────────────────────────────────

/// Wire format:
/// `{"realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm;rate=16000", "data": "<base64>"}]}}`
fn build_audio_message(pcm: &[u8]) -> serde_json::Value {
    let b64 = base64::engine::general_purpose::STANDARD.encode(pcm);
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": INPUT_AUDIO_MIME,
                "data": b64,
            }]
        }
    })
}

/// Wire format: `{"realtimeInput": {"audioStreamEnd": true}}`
fn build_audio_stream_end_message() -> serde_json::Value {
    serde_json::json!({
        "realtimeInput": { "audioStreamEnd": true }
    })
}

// ── Server message parsing ─────────────────────────────────────────

/// Parse one JSON server frame into a list of events.
///
/// A single frame can carry several events at once (audio chunks plus
/// a transcript fragment, say).
pub(crate) fn parse_server_message(json_text: &str) -> Vec<LiveEvent> {
    let mut events = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            events.push(LiveEvent::Error {
                message: format!("malformed server frame: {e}"),
            });
            return events;
        }
    };

    if value.get("setupComplete").is_some() {
        events.push(LiveEvent::SetupComplete);
    }

    if let Some(content) = value.get("serverContent") {
        if content.get("interrupted").and_then(|v| v.as_bool()) == Some(true) {
            events.push(LiveEvent::Interrupted);
        }
        if let Some(parts) = content
            .pointer("/modelTurn/parts")
            .and_then(|v| v.as_array())
        {
            for part in parts {
                if let Some(data_b64) = part.pointer("/inlineData/data").and_then(|v| v.as_str()) {
                    match base64::engine::general_purpose::STANDARD.decode(data_b64) {
                        Ok(data) => events.push(LiveEvent::Audio { data }),
                        Err(e) => events.push(LiveEvent::Error {
                            message: format!("undecodable audio payload: {e}"),
                        }),
                    }
                }
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    events.push(LiveEvent::OutputTranscript {
                        text: text.to_string(),
                    });
                }
            }
        }
        if let Some(text) = content
            .pointer("/inputTranscription/text")
            .and_then(|v| v.as_str())
        {
            if !text.is_empty() {
                events.push(LiveEvent::InputTranscript {
                    text: text.to_string(),
                });
            }
        }
        if let Some(text) = content
            .pointer("/outputTranscription/text")
            .and_then(|v| v.as_str())
        {
            if !text.is_empty() {
                events.push(LiveEvent::OutputTranscript {
                    text: text.to_string(),
                });
            }
        }
        // turnComplete last: consumers finalize the turn after its
        // audio and transcript fragments from the same frame.
        if content.get("turnComplete").and_then(|v| v.as_bool()) == Some(true) {
            events.push(LiveEvent::TurnComplete);
        }
    }

    // Transcriptions also appear at the top level on some server versions.
    for (key, variant) in [
        ("inputTranscription", true),
        ("outputTranscription", false),
    ] {
        if let Some(text) = value
            .pointer(&format!("/{key}/text"))
            .and_then(|v| v.as_str())
        {
            if !text.is_empty() {
                events.push(if variant {
                    LiveEvent::InputTranscript {
                        text: text.to_string(),
                    }
                } else {
                    LiveEvent::OutputTranscript {
                        text: text.to_string(),
                    }
                });
            }
        }
    }

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown server error");
        events.push(LiveEvent::Error {
            message: message.to_string(),
        });
    }

    events
}

// ── Backend implementation ─────────────────────────────────────────

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// The production [`LiveBackend`]: opens a Gemini Live WebSocket,
/// completes the setup handshake, then runs inbound and outbound pump
/// loops over the split stream.
#[derive(Debug, Default)]
pub struct GeminiLive;

#[async_trait]
impl LiveBackend for GeminiLive {
    async fn connect(
        &self,
        session_id: &str,
        config: &TranslatorConfig,
    ) -> Result<LiveConnection, TranslateError> {
        let url = format!("{LIVE_WS_URL}?key={}", config.api_key);

        tracing::info!(
            session_id = %session_id,
            model = LIVE_MODEL,
            source = config.source.label(),
            target = config.target.label(),
            "Connecting to live translation backend"
        );

        let (mut ws_stream, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| TranslateError::ConnectionFailed(format!("websocket connect: {e}")))?;

        // Setup handshake on the unsplit stream.
        let setup_json = serde_json::to_string(&build_setup_message(config))
            .map_err(|e| TranslateError::ConnectionFailed(format!("setup serialize: {e}")))?;
        ws_stream
            .send(WsMessage::Text(setup_json.into()))
            .await
            .map_err(|e| TranslateError::ConnectionFailed(format!("setup send: {e}")))?;

        wait_for_setup_complete(&mut ws_stream, session_id).await?;

        let (ws_sink, ws_source) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(256);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(256);

        let sid = session_id.to_string();
        tokio::spawn(outbound_loop(outbound_rx, ws_sink, sid.clone()));
        tokio::spawn(inbound_loop(ws_source, event_tx, sid));

        Ok(LiveConnection::new(outbound_tx, event_rx))
    }
}

/// Block until the server acknowledges the setup frame.
async fn wait_for_setup_complete(
    ws_stream: &mut WsStream,
    session_id: &str,
) -> Result<(), TranslateError> {
    let handshake = tokio::time::timeout(SETUP_TIMEOUT, async {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(WsMessage::Binary(data)) if data.first() == Some(&b'{') => {
                    if let Ok(text) = std::str::from_utf8(&data) {
                        if text.contains("setupComplete") {
                            return Ok(());
                        }
                    }
                }
                Ok(WsMessage::Text(text)) if text.contains("setupComplete") => {
                    return Ok(());
                }
                Ok(WsMessage::Close(frame)) => {
                    return Err(TranslateError::ConnectionFailed(format!(
                        "closed before setup completed: {frame:?}"
                    )));
                }
                Err(e) => {
                    return Err(TranslateError::ConnectionFailed(format!(
                        "websocket error during setup: {e}"
                    )));
                }
                Ok(other) => {
                    tracing::debug!(
                        session_id = %session_id,
                        frame = ?other,
                        "Ignoring frame during setup handshake"
                    );
                }
            }
        }
        Err(TranslateError::ConnectionFailed(
            "stream ended before setup completed".into(),
        ))
    })
    .await;

    match handshake {
        Ok(result) => {
            if result.is_ok() {
                tracing::info!(session_id = %session_id, "Live setup complete");
            }
            result
        }
        Err(_) => Err(TranslateError::ConnectionFailed(format!(
            "setup handshake timed out after {}s",
            SETUP_TIMEOUT.as_secs()
        ))),
    }
}

/// Outbound loop: wrap PCM frames in JSON and write to the socket.
async fn outbound_loop(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut ws_sink: futures_util::stream::SplitSink<WsStream, WsMessage>,
    session_id: String,
) {
    let mut chunk_count: u64 = 0;
    let mut total_bytes: u64 = 0;

    while let Some(frame) = rx.recv().await {
        let message = match frame {
            OutboundFrame::Audio(pcm) => {
                chunk_count += 1;
                total_bytes += pcm.len() as u64;
                if chunk_count == 1 || chunk_count % 50 == 0 {
                    tracing::debug!(
                        session_id = %session_id,
                        chunk = chunk_count,
                        total_bytes,
                        "Sending audio chunk"
                    );
                }
                build_audio_message(&pcm)
            }
            OutboundFrame::AudioStreamEnd => {
                tracing::info!(session_id = %session_id, "Sending audioStreamEnd");
                build_audio_stream_end_message()
            }
            OutboundFrame::Close => {
                let _ = ws_sink.send(WsMessage::Close(None)).await;
                break;
            }
        };
        match serde_json::to_string(&message) {
            Ok(json) => {
                if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                    tracing::warn!(
                        session_id = %session_id,
                        "WebSocket send failed, closing outbound loop"
                    );
                    break;
                }
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Frame serialize failed");
            }
        }
    }

    tracing::debug!(session_id = %session_id, "Outbound loop terminated");
}

/// Inbound loop: decode server frames and forward events.
async fn inbound_loop(
    mut ws_source: futures_util::stream::SplitStream<WsStream>,
    event_tx: mpsc::Sender<LiveEvent>,
    session_id: String,
) {
    let mut audio_count: u64 = 0;

    while let Some(msg) = ws_source.next().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text.to_string(),
            // The server sends JSON inside Binary frames.
            Ok(WsMessage::Binary(data)) if data.first() == Some(&b'{') => {
                match std::str::from_utf8(&data) {
                    Ok(text) => text.to_string(),
                    Err(_) => continue,
                }
            }
            Ok(WsMessage::Binary(data)) => {
                tracing::warn!(
                    session_id = %session_id,
                    len = data.len(),
                    "Unexpected non-JSON binary frame, skipping"
                );
                continue;
            }
            Ok(WsMessage::Close(frame)) => {
                tracing::info!(session_id = %session_id, close_frame = ?frame, "Connection closed");
                let _ = event_tx.send(LiveEvent::Closed).await;
                return;
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => continue,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "WebSocket error");
                let _ = event_tx
                    .send(LiveEvent::Error {
                        message: format!("websocket error: {e}"),
                    })
                    .await;
                let _ = event_tx.send(LiveEvent::Closed).await;
                return;
            }
        };

        for event in parse_server_message(&text) {
            tracing::trace!(session_id = %session_id, kind = event.kind(), "Inbound event");
            match &event {
                LiveEvent::Audio { data } => {
                    audio_count += 1;
                    tracing::debug!(
                        session_id = %session_id,
                        audio_n = audio_count,
                        bytes = data.len(),
                        "Audio response"
                    );
                }
                LiveEvent::TurnComplete => {
                    tracing::info!(session_id = %session_id, "Turn complete");
                }
                LiveEvent::Interrupted => {
                    tracing::info!(session_id = %session_id, "Interrupted by speaker");
                }
                LiveEvent::Error { message } => {
                    tracing::warn!(session_id = %session_id, error = %message, "Server error event");
                }
                _ => {}
            }
            if event_tx.send(event).await.is_err() {
                tracing::debug!(
                    session_id = %session_id,
                    "Event receiver dropped, closing inbound loop"
                );
                return;
            }
        }
    }

    let _ = event_tx.send(LiveEvent::Closed).await;
    tracing::debug!(session_id = %session_id, "Inbound loop terminated");
}

// ── Tests ──────────────────────────────────────────────────────────
