//! Backend seam: anything that can open a live translation connection.
//!
//! The production implementation speaks the Gemini Live WebSocket
//! protocol; tests substitute a scripted backend that replays a fixed
//! event sequence without any network.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::events::LiveEvent;
use crate::config::TranslatorConfig;
use crate::error::TranslateError;

/// Outbound frame toward the streaming backend.
#[derive(Debug)]
pub enum OutboundFrame {
    /// Raw PCM16LE microphone audio (16 kHz mono).
    Audio(Vec<u8>),
    /// The microphone stopped; flush any buffered input.
    AudioStreamEnd,
    /// Close the connection gracefully.
    Close,
}

/// A live, established connection: a sender for outbound frames and a
/// receiver for decoded events. Dropping either half tears the
/// connection down.
pub struct LiveConnection {
    outbound: mpsc::Sender<OutboundFrame>,
    events: mpsc::Receiver<LiveEvent>,
}

impl LiveConnection {
    pub fn new(
        outbound: mpsc::Sender<OutboundFrame>,
        events: mpsc::Receiver<LiveEvent>,
    ) -> Self {
        Self { outbound, events }
    }

    /// Request a graceful close. Safe to call more than once.
    pub async fn close(&self) {
        let _ = self.outbound.send(OutboundFrame::Close).await;
    }

    /// Separate the outbound and event halves. The session pump owns
    /// the event receiver while the teardown path keeps a sender clone.
    pub fn split(self) -> (mpsc::Sender<OutboundFrame>, mpsc::Receiver<LiveEvent>) {
        (self.outbound, self.events)
    }
}

/// Opens live connections. Implemented by the Gemini Live client and by
/// scripted test backends.
#[async_trait]
pub trait LiveBackend: Send + Sync {
    async fn connect(
        &self,
        session_id: &str,
        config: &TranslatorConfig,
    ) -> Result<LiveConnection, TranslateError>;
}
