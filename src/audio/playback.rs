//! Gapless playback scheduling on a monotonic output clock.
//!
//! Decoded audio buffers arrive faster than real time; the scheduler
//! places each one at `max(last_scheduled_end, now)` so playback is
//! back-to-back with no gaps and no overlaps, however bursty the
//! network is. Barge-in (`interrupt`) cancels every in-flight unit and
//! resets the anchor to the *current* clock time — never to zero, which
//! would place subsequent audio in the past and make it play instantly
//! and out of order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use crate::audio::codec::OUTPUT_SAMPLE_RATE;
use crate::error::TranslateError;

// ── Clock and sink seams ───────────────────────────────────────────

/// Monotonic output clock, in seconds since the context opened.
pub trait PlaybackClock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// Receives scheduled samples. The production sink writes into the
/// output device's sample timeline; tests record the calls.
pub trait AudioSink: Send {
    /// Place mono samples on the timeline starting at `at_secs`.
    /// Callers guarantee `at_secs` is at or after everything already
    /// scheduled.
    fn schedule(&mut self, at_secs: f64, samples: &[f32]);

    /// Discard everything not yet played.
    fn clear(&mut self);
}

// ── Scheduler ──────────────────────────────────────────────────────

/// One scheduled buffer on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUnit {
    pub id: u64,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Schedules decoded buffers back-to-back and tracks every in-flight
/// unit so barge-in can cancel them all at once.
pub struct PlaybackScheduler {
    clock: Arc<dyn PlaybackClock>,
    sink: Box<dyn AudioSink>,
    sample_rate: u32,
    last_scheduled_end: f64,
    next_id: u64,
    active: Vec<PlaybackUnit>,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn PlaybackClock>, sink: Box<dyn AudioSink>, sample_rate: u32) -> Self {
        Self {
            clock,
            sink,
            sample_rate,
            last_scheduled_end: 0.0,
            next_id: 0,
            active: Vec::new(),
        }
    }

    /// Schedule a buffer of mono samples for gapless playback.
    pub fn enqueue(&mut self, samples: &[f32]) -> PlaybackUnit {
        self.prune();

        let now = self.clock.now_secs();
        let start = self.last_scheduled_end.max(now);
        let duration = samples.len() as f64 / self.sample_rate as f64;

        self.sink.schedule(start, samples);

        let unit = PlaybackUnit {
            id: self.next_id,
            start_secs: start,
            end_secs: start + duration,
        };
        self.next_id += 1;
        self.last_scheduled_end = unit.end_secs;
        self.active.push(unit);
        unit
    }

    /// Barge-in: stop every active unit now and reset the timeline
    /// anchor to the current clock time.
    pub fn interrupt(&mut self) {
        let cancelled = self.active.len();
        self.sink.clear();
        self.active.clear();
        self.last_scheduled_end = self.clock.now_secs();
        if cancelled > 0 {
            tracing::debug!(cancelled, "Playback interrupted");
        }
    }

    /// Whether any scheduled audio is still before its end time.
    pub fn is_speaking(&mut self) -> bool {
        self.prune();
        !self.active.is_empty()
    }

    /// Number of units still in flight.
    pub fn active_units(&mut self) -> usize {
        self.prune();
        self.active.len()
    }

    pub fn last_scheduled_end(&self) -> f64 {
        self.last_scheduled_end
    }

    /// Drop units whose playback has naturally completed.
    fn prune(&mut self) {
        let now = self.clock.now_secs();
        self.active.retain(|u| u.end_secs > now);
    }
}

// ── Manual clock (tests and embedders without a device) ────────────

/// A clock advanced by hand.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock() = secs;
    }
}

impl PlaybackClock for ManualClock {
    fn now_secs(&self) -> f64 {
        *self.now.lock()
    }
}

// ── Output device context ──────────────────────────────────────────

/// Shared state between the output callback thread and the scheduler:
/// a sample timeline whose front is "now" and a playhead counter that
/// doubles as the output clock.
struct OutputShared {
    timeline: Mutex<VecDeque<f32>>,
    playhead: AtomicU64,
    sample_rate: u32,
}

impl OutputShared {
    fn new(sample_rate: u32) -> Self {
        Self {
            timeline: Mutex::new(VecDeque::new()),
            playhead: AtomicU64::new(0),
            sample_rate,
        }
    }

    /// Pop the next mono sample for the device callback.
    fn next_sample(&self) -> f32 {
        let sample = self.timeline.lock().pop_front().unwrap_or(0.0);
        self.playhead.fetch_add(1, Ordering::Relaxed);
        sample
    }
}

impl PlaybackClock for OutputShared {
    fn now_secs(&self) -> f64 {
        self.playhead.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

/// Sink half of the shared timeline.
struct TimelineSink(Arc<OutputShared>);

impl AudioSink for TimelineSink {
    fn schedule(&mut self, at_secs: f64, samples: &[f32]) {
        let rate = self.0.sample_rate as f64;
        let at_sample = (at_secs * rate).round() as u64;

        let mut timeline = self.0.timeline.lock();
        // The timeline's end in absolute samples. The playhead may tick
        // forward while we hold the lock-free counter; any drift is well
        // under one callback quantum and inaudible.
        let end = self.0.playhead.load(Ordering::Relaxed) + timeline.len() as u64;
        if at_sample > end {
            // Silent gap up to the scheduled start.
            timeline.extend(std::iter::repeat(0.0).take((at_sample - end) as usize));
        }
        timeline.extend(samples.iter().copied());
    }

    fn clear(&mut self) {
        self.0.timeline.lock().clear();
    }
}

/// See capture — exclusive access to the stream is serialized through
/// the surrounding mutex.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendableStream {}

/// The output half of the audio device: one cpal stream at 24 kHz fed
/// from the shared timeline. Deliberately kept alive across stop/start
/// cycles to avoid platform reinitialization costs.
pub struct OutputContext {
    _stream: Mutex<Option<SendableStream>>,
    shared: Arc<OutputShared>,
}

impl OutputContext {
    /// Open the default output device.
    pub fn open() -> Result<Self, TranslateError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TranslateError::DeviceUnavailable("no output device".into()))?;

        let shared = Arc::new(OutputShared::new(OUTPUT_SAMPLE_RATE));
        let err_callback = |err| {
            tracing::warn!(error = %err, "Playback stream error");
        };

        // Stereo fan-out first — many devices refuse mono.
        let stereo = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(OUTPUT_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };
        let s = Arc::clone(&shared);
        let stream = match device.build_output_stream(
            &stereo,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(2) {
                    let sample = s.next_sample();
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            err_callback,
            None,
        ) {
            Ok(stream) => stream,
            Err(_) => {
                let mono = cpal::StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(OUTPUT_SAMPLE_RATE),
                    buffer_size: cpal::BufferSize::Default,
                };
                let s = Arc::clone(&shared);
                device
                    .build_output_stream(
                        &mono,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            for out in data.iter_mut() {
                                *out = s.next_sample();
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| {
                        TranslateError::DeviceUnavailable(format!("output stream: {e}"))
                    })?
            }
        };
        stream
            .play()
            .map_err(|e| TranslateError::DeviceUnavailable(format!("output stream: {e}")))?;

        Ok(Self {
            _stream: Mutex::new(Some(SendableStream(stream))),
            shared,
        })
    }

    /// Build a scheduler over this context's clock and timeline.
    pub fn scheduler(&self) -> PlaybackScheduler {
        PlaybackScheduler::new(
            Arc::clone(&self.shared) as Arc<dyn PlaybackClock>,
            Box::new(TimelineSink(Arc::clone(&self.shared))),
            self.shared.sample_rate,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────────────
