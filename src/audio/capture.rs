//! Microphone capture: a cpal input stream framed into fixed-size chunks.
//!
//! Capture is push-driven. The platform's real-time audio thread fills a
//! frame buffer at its own cadence and pushes completed frames into a
//! bounded queue; the session drains the queue asynchronously. When the
//! consumer lags, the oldest frame is dropped — real-time capture cannot
//! block, and stale audio is worth less than fresh audio.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::audio::codec::INPUT_SAMPLE_RATE;
use crate::error::TranslateError;

/// Samples per capture frame (~256 ms at 16 kHz).
pub const FRAME_SAMPLES: usize = 4096;

/// Frames buffered before the queue starts dropping the oldest.
const QUEUE_CAPACITY: usize = 32;

// ── Configuration ──────────────────────────────────────────────────

/// Capture constraints requested from the platform.
///
/// The processing flags (echo cancellation, noise suppression, AGC) are
/// applied by hosts that process the capture path (PipeWire, PulseAudio,
/// WASAPI); on raw ALSA devices they are a no-op. Either way the request
/// is recorded in the session log.
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub frame_samples: usize,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: INPUT_SAMPLE_RATE,
            frame_samples: FRAME_SAMPLES,
        }
    }
}

// ── Frame queue (drop-oldest) ──────────────────────────────────────

/// Bounded frame queue between the audio callback thread and the async
/// consumer. Push never blocks; overflow evicts the oldest frame.
struct FrameQueue {
    frames: Mutex<VecDeque<Vec<f32>>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    capacity: usize,
}

impl FrameQueue {
    fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            capacity,
        }
    }

    /// Called from the real-time audio callback.
    fn push(&self, frame: Vec<f32>) {
        {
            let mut frames = self.frames.lock();
            if frames.len() == self.capacity {
                frames.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Await the next frame; `None` once the queue is closed and drained.
    async fn recv(&self) -> Option<Vec<f32>> {
        loop {
            // Register for notification before checking, so a push or
            // close between the check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(frame) = self.frames.lock().pop_front() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    fn clear(&self) {
        self.frames.lock().clear();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Source trait (seam for tests) ──────────────────────────────────

/// A push-driven source of fixed-size capture frames.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Await the next frame of mono float samples at the input rate.
    /// Returns `None` once the source is closed.
    async fn next_frame(&self) -> Option<Vec<f32>>;

    /// Throw away frames captured but not yet consumed. Sessions call
    /// this once the connection opens so audio captured while still
    /// connecting is never sent.
    fn discard_pending(&self) {}

    /// Stop the device and release it. Idempotent.
    fn close(&self);
}

/// Opens an [`AudioSource`] for a session. The production implementation
/// acquires a real microphone; tests substitute scripted sources.
pub trait SourceOpener: Send + Sync {
    fn open(&self, config: &MicrophoneConfig) -> Result<Arc<dyn AudioSource>, TranslateError>;
}

/// Opens the default cpal input device.
pub struct CpalSourceOpener;

impl SourceOpener for CpalSourceOpener {
    fn open(&self, config: &MicrophoneConfig) -> Result<Arc<dyn AudioSource>, TranslateError> {
        Ok(Arc::new(Microphone::open(config.clone())?))
    }
}

// ── Microphone ─────────────────────────────────────────────────────

/// Wrapper for `cpal::Stream` so the handle can live inside a `Send`
/// session. Access is serialized through the surrounding mutex; the
/// stream itself is never used from two threads at once.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: see above — exclusive access via Mutex, no concurrent use.
unsafe impl Send for SendableStream {}

/// A live microphone handle producing fixed-size frames.
pub struct Microphone {
    stream: Mutex<Option<SendableStream>>,
    queue: Arc<FrameQueue>,
}

impl Microphone {
    /// Request audio capture with the given constraints.
    ///
    /// Tries mono float at the input rate first, then the device's native
    /// configuration with software downmix and resample. Fails with
    /// [`TranslateError::PermissionDenied`] when the host refuses access,
    /// [`TranslateError::DeviceUnavailable`] otherwise.
    pub fn open(config: MicrophoneConfig) -> Result<Self, TranslateError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| TranslateError::DeviceUnavailable("no input device".into()))?;

        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".into());
        tracing::debug!(
            device = %device_name,
            echo_cancellation = config.echo_cancellation,
            noise_suppression = config.noise_suppression,
            auto_gain_control = config.auto_gain_control,
            "Opening microphone"
        );

        let queue = Arc::new(FrameQueue::new(QUEUE_CAPACITY));
        let stream = Self::build_stream(&device, &config, Arc::clone(&queue))?;
        stream
            .play()
            .map_err(|e| classify_device_error(&e.to_string()))?;

        Ok(Self {
            stream: Mutex::new(Some(SendableStream(stream))),
            queue,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        config: &MicrophoneConfig,
        queue: Arc<FrameQueue>,
    ) -> Result<cpal::Stream, TranslateError> {
        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let err_callback = |err| {
            tracing::warn!(error = %err, "Capture stream error");
        };

        // Preferred path: mono f32 at the input rate. PipeWire and
        // PulseAudio convert transparently.
        let frame_samples = config.frame_samples;
        let q = Arc::clone(&queue);
        let mut framer = Framer::new(frame_samples);
        if let Ok(stream) = device.build_input_stream(
            &preferred,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                framer.extend(data, |frame| q.push(frame));
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at the device's native configuration and
        // convert in software.
        let native = device
            .default_input_config()
            .map_err(|e| classify_device_error(&e.to_string()))?;
        let native_rate = native.sample_rate().0;
        let native_channels = native.channels() as usize;
        let stream_config: cpal::StreamConfig = native.clone().into();

        tracing::debug!(
            channels = native_channels,
            rate = native_rate,
            format = ?native.sample_format(),
            "Preferred capture config rejected, using native config"
        );

        let target_rate = config.sample_rate;
        let mut framer = Framer::new(frame_samples);
        match native.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mono = downmix_and_resample(data, native_channels, native_rate, target_rate);
                        framer.extend(&mono, |frame| queue.push(frame));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| classify_device_error(&e.to_string())),
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let float: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        let mono =
                            downmix_and_resample(&float, native_channels, native_rate, target_rate);
                        framer.extend(&mono, |frame| queue.push(frame));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| classify_device_error(&e.to_string())),
            fmt => Err(TranslateError::DeviceUnavailable(format!(
                "unsupported native sample format {fmt:?}"
            ))),
        }
    }
}

#[async_trait]
impl AudioSource for Microphone {
    async fn next_frame(&self) -> Option<Vec<f32>> {
        self.queue.recv().await
    }

    fn discard_pending(&self) {
        self.queue.clear();
    }

    fn close(&self) {
        // Dropping the stream stops the device; safe to call twice.
        if self.stream.lock().take().is_some() {
            tracing::debug!(dropped_frames = self.queue.dropped(), "Microphone closed");
        }
        self.queue.close();
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Accumulates callback buffers and emits fixed-size frames.
struct Framer {
    pending: Vec<f32>,
    frame_samples: usize,
}

impl Framer {
    fn new(frame_samples: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_samples * 2),
            frame_samples,
        }
    }

    fn extend(&mut self, samples: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            emit(frame);
        }
    }
}

/// Mix interleaved multi-channel audio to mono and linearly resample.
fn downmix_and_resample(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let mono: Vec<f32> = if channels <= 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if source_rate == target_rate || mono.is_empty() {
        return mono;
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (mono.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = mono[idx];
            let b = mono.get(idx + 1).copied().unwrap_or(a);
            a + (b - a) * frac
        })
        .collect()
}

fn classify_device_error(message: &str) -> TranslateError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
        TranslateError::PermissionDenied
    } else {
        TranslateError::DeviceUnavailable(message.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_emits_fixed_frames() {
        let mut framer = Framer::new(4);
        let mut frames = Vec::new();
        framer.extend(&[1.0, 2.0, 3.0], |f| frames.push(f));
        assert!(frames.is_empty());
        framer.extend(&[4.0, 5.0], |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![1.0, 2.0, 3.0, 4.0]);
        // Remainder carries over.
        framer.extend(&[6.0, 7.0, 8.0], |f| frames.push(f));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn framer_emits_multiple_frames_from_one_burst() {
        let mut framer = Framer::new(2);
        let mut frames = Vec::new();
        framer.extend(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], |f| frames.push(f));
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn queue_delivers_in_order() {
        let queue = FrameQueue::new(4);
        queue.push(vec![1.0]);
        queue.push(vec![2.0]);
        assert_eq!(queue.recv().await, Some(vec![1.0]));
        assert_eq!(queue.recv().await, Some(vec![2.0]));
    }

    #[tokio::test]
    async fn queue_drops_oldest_on_overflow() {
        let queue = FrameQueue::new(2);
        queue.push(vec![1.0]);
        queue.push(vec![2.0]);
        queue.push(vec![3.0]);
        assert_eq!(queue.dropped(), 1);
        // Oldest frame evicted; newest two survive.
        assert_eq!(queue.recv().await, Some(vec![2.0]));
        assert_eq!(queue.recv().await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn queue_clear_discards_buffered_frames_only() {
        let queue = FrameQueue::new(4);
        queue.push(vec![1.0]);
        queue.push(vec![2.0]);
        queue.clear();
        queue.push(vec![3.0]);
        assert_eq!(queue.recv().await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn queue_recv_returns_none_after_close() {
        let queue = FrameQueue::new(2);
        queue.push(vec![1.0]);
        queue.close();
        // Buffered frames drain before the end-of-stream signal.
        assert_eq!(queue.recv().await, Some(vec![1.0]));
        assert_eq!(queue.recv().await, None);
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn queue_close_wakes_pending_recv() {
        let queue = Arc::new(FrameQueue::new(2));
        let q = Arc::clone(&queue);
        let waiter = tokio::spawn(async move { q.recv().await });
        tokio::task::yield_now().await;
        queue.close();
        let got = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("recv should wake on close")
            .unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        let mono = downmix_and_resample(&stereo, 2, 16_000, 16_000);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn resample_halves_length_for_double_rate() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = downmix_and_resample(&samples, 1, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        // Linear interpolation keeps the ramp monotonic.
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn classify_permission_errors() {
        assert!(matches!(
            classify_device_error("Access denied by policy"),
            TranslateError::PermissionDenied
        ));
        assert!(matches!(
            classify_device_error("device disconnected"),
            TranslateError::DeviceUnavailable(_)
        ));
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn open_close_idempotent_on_real_device() {
        let mic = Microphone::open(MicrophoneConfig::default()).expect("open microphone");
        mic.close();
        mic.close();
    }
}
