//! Gap-free scheduling of inbound audio chunks
//!
//! Chunks arrive whenever the network delivers them, but must play back to
//! back. The scheduler keeps one cursor, the earliest time the next chunk may
//! start, and places each chunk at `max(cursor, now)`:
//!
//! ```text
//!  clock ──────────────────────────────────────────────────────────►
//!          │ chunk A │ chunk B │        (underrun)      │ chunk C │
//!          ▲                   ▲                        ▲
//!          now at A            cursor after B           now at C > cursor
//! ```
//!
//! While chunks keep up, each one starts exactly where the previous one
//! ended. After an underrun the next chunk starts at "now" instead of in the
//! past, which resynchronizes the timeline without any look-ahead buffer.

use tracing::{debug, warn};

use crate::error::AudioError;

/// An output device driven by a monotonic clock in seconds
pub trait AudioOutput: Send {
    /// Current position of the output clock in seconds
    fn now(&self) -> f64;

    /// Queue mono samples to start playing exactly at `start` seconds
    fn enqueue(&mut self, start: f64, samples: Vec<f32>) -> Result<(), AudioError>;

    /// Release the device. Must be idempotent.
    fn close(&mut self);
}

/// Where and for how long a chunk was placed on the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub start: f64,
    pub duration: f64,
    pub samples: usize,
}

impl ScheduledChunk {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Places decoded chunks on the output timeline in arrival order
pub struct PlaybackScheduler {
    sample_rate: u32,
    output: Option<Box<dyn AudioOutput>>,
    /// Earliest start for the next chunk; `None` until the first chunk
    next_play_start: Option<f64>,
    /// Set once the output failed; chunks are dropped until `reset`
    suspended: bool,
    chunks_scheduled: u64,
    chunks_dropped: u64,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            output: None,
            next_play_start: None,
            suspended: false,
            chunks_scheduled: 0,
            chunks_dropped: 0,
        }
    }

    /// Create a scheduler that renders to `output`
    pub fn with_output(sample_rate: u32, output: Box<dyn AudioOutput>) -> Self {
        let mut scheduler = Self::new(sample_rate);
        scheduler.attach(output);
        scheduler
    }

    /// Attach (or replace) the output device and clear suspension
    pub fn attach(&mut self, output: Box<dyn AudioOutput>) {
        if let Some(mut previous) = self.output.replace(output) {
            previous.close();
        }
        self.next_play_start = None;
        self.suspended = false;
    }

    /// Schedule one chunk for playback.
    ///
    /// Returns `Ok(None)` when the chunk was dropped because playback is
    /// suspended. The first failure of the output is returned as
    /// `PlaybackUnavailable` and suspends playback until [`reset`](Self::reset).
    pub fn schedule(&mut self, samples: Vec<f32>) -> Result<Option<ScheduledChunk>, AudioError> {
        if self.suspended {
            self.chunks_dropped += 1;
            return Ok(None);
        }

        let Some(output) = self.output.as_mut() else {
            self.suspended = true;
            self.chunks_dropped += 1;
            return Err(AudioError::PlaybackUnavailable(
                "no output device attached".to_string(),
            ));
        };

        let sample_count = samples.len();
        let duration = sample_count as f64 / self.sample_rate as f64;
        let now = output.now();
        let start = match self.next_play_start {
            Some(next) if next >= now => next,
            Some(next) => {
                debug!(gap_ms = (now - next) * 1000.0, "Playback underrun, resyncing to clock");
                now
            }
            None => now,
        };

        if let Err(e) = output.enqueue(start, samples) {
            warn!("Output rejected chunk, suspending playback: {}", e);
            self.suspended = true;
            self.chunks_dropped += 1;
            return Err(match e {
                AudioError::PlaybackUnavailable(_) => e,
                other => AudioError::PlaybackUnavailable(other.to_string()),
            });
        }

        self.next_play_start = Some(start + duration);
        self.chunks_scheduled += 1;

        Ok(Some(ScheduledChunk {
            start,
            duration,
            samples: sample_count,
        }))
    }

    /// Clear the timeline and release the output. Idempotent.
    pub fn reset(&mut self) {
        self.next_play_start = None;
        self.suspended = false;
        if let Some(mut output) = self.output.take() {
            output.close();
        }
    }

    pub fn next_play_start(&self) -> Option<f64> {
        self.next_play_start
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn chunks_scheduled(&self) -> u64 {
        self.chunks_scheduled
    }

    pub fn chunks_dropped(&self) -> u64 {
        self.chunks_dropped
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.reset();
    }
}
