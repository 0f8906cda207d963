//! Microphone capture
//!
//! The input stream runs in its own thread (cpal streams are not `Send`).
//! The device runs at its preferred rate. Its callback downmixes to mono,
//! resamples to the configured rate, cuts the signal into fixed-size blocks,
//! encodes each block and hands it to the session through a bounded queue.
//! A block that does not fit in the queue is dropped rather than buffered.
//! The stream opens muted and only emits once `connect` is called.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::audio::buffer::{downmix_to_mono, AudioFrame, FrameAssembler};
use crate::audio::device::find_input_device;
use crate::audio::resample::StreamResampler;
use crate::config::CaptureConfig;
use crate::error::AudioError;

/// What the capture side reports to the session
#[derive(Debug)]
pub enum CaptureEvent {
    /// A complete encoded block, in capture order
    Frame(AudioFrame),
    /// The input stream failed; the session cannot continue
    Failed(AudioError),
}

/// A running capture stream
pub trait CaptureStream: Send {
    /// Start emitting frames
    fn connect(&mut self);

    /// Stop emitting frames. Idempotent.
    fn disconnect(&mut self);

    /// Stop the device and release it. Idempotent.
    fn release(&mut self);
}

/// Forwards a stream failure to the session once the frame queue has room.
///
/// Failures arrive on their own channel so a full frame queue cannot lose
/// them; the relay retries on every poll until delivery or shutdown.
#[derive(Default)]
pub(crate) struct FailureRelay {
    pending: Option<CaptureEvent>,
    delivered: bool,
}

impl FailureRelay {
    pub(crate) fn poll(
        &mut self,
        errors: &Receiver<AudioError>,
        events: &mpsc::Sender<CaptureEvent>,
    ) {
        if self.delivered {
            return;
        }
        if self.pending.is_none() {
            self.pending = errors.try_recv().ok().map(CaptureEvent::Failed);
        }
        let Some(event) = self.pending.take() else {
            return;
        };
        match events.try_send(event) {
            Ok(()) => self.delivered = true,
            Err(TrySendError::Full(event)) => self.pending = Some(event),
            Err(TrySendError::Closed(_)) => self.delivered = true,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Capture from a cpal input device
pub struct DeviceCapture {
    /// Whether the callback forwards frames
    emitting: Arc<AtomicBool>,

    /// Whether the stream thread keeps the device open
    running: Arc<AtomicBool>,

    /// Blocks discarded because the session queue was full
    frames_dropped: Arc<AtomicU64>,

    thread_handle: Option<JoinHandle<()>>,
}

impl DeviceCapture {
    /// Open the configured input device, muted.
    ///
    /// Fails with `DeviceUnavailable` when the device is missing, access is
    /// refused, or its stream cannot be built.
    pub fn open(
        config: &CaptureConfig,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Self, AudioError> {
        let device = find_input_device(config.device.as_deref())?;
        let default_config = device.default_input_config()?;

        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = stream_config.channels;
        let device_rate = stream_config.sample_rate.0;

        let emitting = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let frames_dropped = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let emitting_for_callback = emitting.clone();
        let emitting_for_errors = emitting.clone();
        let running_for_loop = running.clone();
        let dropped = frames_dropped.clone();
        let failure_events = events.clone();
        let mut resampler = StreamResampler::new(device_rate, config.sample_rate);
        let mut resampled = Vec::new();
        let mut assembler = FrameAssembler::new(config.block_size);
        let name = device.name.clone();
        let sample_rate = config.sample_rate;

        let handle = thread::Builder::new()
            .name("capture-input".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let stream = cpal_device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !emitting_for_callback.load(Ordering::Relaxed) {
                            return;
                        }
                        let mono = downmix_to_mono(data, channels);
                        resampled.clear();
                        resampler.process(&mono, &mut resampled);
                        assembler.push(&resampled, |frame| {
                            if events.try_send(CaptureEvent::Frame(frame)).is_err() {
                                dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        });
                    },
                    move |err| {
                        tracing::error!("Input stream error: {}", err);
                        // Free the queue for the failure report
                        emitting_for_errors.store(false, Ordering::SeqCst);
                        let _ = error_tx.try_send(AudioError::Stream(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                let mut relay = FailureRelay::default();
                while running_for_loop.load(Ordering::Relaxed) {
                    relay.poll(&error_rx, &failure_events);
                    thread::sleep(Duration::from_millis(10));
                }
                if relay.is_pending() {
                    tracing::warn!("Capture released before its failure was reported");
                }

                // Stream is dropped here, stopping capture
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| AudioError::DeviceUnavailable("capture thread exited".to_string()))
            .and_then(|result| result);

        let mut capture = Self {
            emitting,
            running,
            frames_dropped,
            thread_handle: Some(handle),
        };

        if let Err(e) = ready {
            capture.release();
            return Err(e);
        }

        tracing::info!(
            "Capture opened on {} at {} Hz ({} Hz on the wire), {} samples per frame",
            name,
            device_rate,
            sample_rate,
            config.block_size
        );
        Ok(capture)
    }

    /// Get count of blocks dropped because the session fell behind
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Check if the device is still held
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl CaptureStream for DeviceCapture {
    fn connect(&mut self) {
        if self.is_running() {
            self.emitting.store(true, Ordering::SeqCst);
        }
    }

    fn disconnect(&mut self) {
        self.emitting.store(false, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.disconnect();
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            let dropped = self.frames_dropped();
            if dropped > 0 {
                tracing::debug!("Capture released, {} frames dropped on a full queue", dropped);
            }
        }
    }
}

impl Drop for DeviceCapture {
    fn drop(&mut self) {
        self.release();
    }
}
