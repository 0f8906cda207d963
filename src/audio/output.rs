//! Device output backed by a sample-accurate timeline
//!
//! The output stream owns a frame counter that advances as the host pulls
//! audio. Its value divided by the sample rate is the playback clock the
//! scheduler reads. Queued chunks carry their start frame; the render
//! callback emits silence until a chunk's start is reached and then plays it
//! to the last sample before moving on to the next one.
//!
//! The device runs at its preferred rate. Chunks arrive at the wire rate and
//! are resampled on enqueue; start times stay in seconds on both sides.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::find_output_device;
use crate::audio::playback::AudioOutput;
use crate::audio::resample::resample;
use crate::error::AudioError;

struct PendingChunk {
    start_frame: u64,
    samples: Vec<f32>,
    played: usize,
}

/// Queue of scheduled chunks plus the render position
pub struct Timeline {
    sample_rate: u32,
    position: u64,
    queue: VecDeque<PendingChunk>,
}

impl Timeline {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            position: 0,
            queue: VecDeque::new(),
        }
    }

    /// Playback clock in seconds
    pub fn now(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    /// Frames rendered so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn push(&mut self, start: f64, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        let start_frame = (start * self.sample_rate as f64).round().max(0.0) as u64;
        self.queue.push_back(PendingChunk {
            start_frame,
            samples,
            played: 0,
        });
    }

    /// Fill an interleaved buffer, duplicating the mono signal to every channel.
    ///
    /// A chunk that is reached late starts where the render position is and
    /// plays in full; samples are never skipped or mixed.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let sample = match self.queue.front_mut() {
                Some(chunk) if chunk.played > 0 || self.position >= chunk.start_frame => {
                    let sample = chunk.samples[chunk.played];
                    chunk.played += 1;
                    if chunk.played == chunk.samples.len() {
                        self.queue.pop_front();
                    }
                    sample
                }
                _ => 0.0,
            };
            frame.fill(sample);
            self.position += 1;
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn queued_chunks(&self) -> usize {
        self.queue.len()
    }
}

/// cpal output stream running on its own thread
pub struct DeviceOutput {
    /// Rate of the samples handed to `enqueue`
    source_rate: u32,
    device_rate: u32,
    timeline: Arc<Mutex<Timeline>>,
    running: Arc<AtomicBool>,
    failed: Arc<Mutex<Option<String>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DeviceOutput {
    /// Open the named (or default) output device for chunks at `sample_rate`.
    pub fn open(device_name: Option<&str>, sample_rate: u32) -> Result<Self, AudioError> {
        let device = find_output_device(device_name)?;
        let default_config = device.default_output_config()?;

        let config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;

        let timeline = Arc::new(Mutex::new(Timeline::new(device_rate)));
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let render_timeline = timeline.clone();
        let running_for_loop = running.clone();
        let failed_for_stream = failed.clone();
        let name = device.name.clone();

        // cpal streams are not Send, so the stream lives and dies on this thread
        let handle = thread::Builder::new()
            .name("playback-output".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let stream = cpal_device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        render_timeline.lock().render(data, channels);
                    },
                    move |err| {
                        tracing::error!("Output stream error: {}", err);
                        *failed_for_stream.lock() = Some(err.to_string());
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::PlaybackUnavailable(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::PlaybackUnavailable(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream is dropped here, releasing the device
            })
            .map_err(|e| AudioError::PlaybackUnavailable(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| AudioError::PlaybackUnavailable("output thread exited".to_string()))
            .and_then(|result| result);

        let mut output = Self {
            source_rate: sample_rate,
            device_rate,
            timeline,
            running,
            failed,
            thread_handle: Some(handle),
        };

        if let Err(e) = ready {
            output.close();
            return Err(e);
        }

        tracing::info!(
            "Playback output opened on {} at {} Hz ({} Hz chunks)",
            name,
            device_rate,
            sample_rate
        );
        Ok(output)
    }
}

impl AudioOutput for DeviceOutput {
    fn now(&self) -> f64 {
        self.timeline.lock().now()
    }

    fn enqueue(&mut self, start: f64, samples: Vec<f32>) -> Result<(), AudioError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::PlaybackUnavailable("output closed".to_string()));
        }
        if let Some(reason) = self.failed.lock().clone() {
            return Err(AudioError::PlaybackUnavailable(reason));
        }
        let samples = if self.source_rate == self.device_rate {
            samples
        } else {
            resample(&samples, self.source_rate, self.device_rate)
        };
        self.timeline.lock().push(start, samples);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.timeline.lock().clear();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_until_start() {
        let mut timeline = Timeline::new(10);
        timeline.push(0.3, vec![0.5, 0.25]);

        let mut out = vec![1.0; 6];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.5, 0.25, 0.0]);
        assert_eq!(timeline.position(), 6);
        assert_eq!(timeline.queued_chunks(), 0);
    }

    #[test]
    fn test_back_to_back_chunks_are_contiguous() {
        let mut timeline = Timeline::new(4);
        timeline.push(0.0, vec![0.1, 0.2]);
        timeline.push(0.5, vec![0.3, 0.4]);

        let mut out = vec![0.0; 4];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_late_chunk_plays_in_full() {
        let mut timeline = Timeline::new(10);
        let mut out = vec![0.0; 5];
        timeline.render(&mut out, 1);

        // Scheduled for frame 2, but the render position is already at 5
        timeline.push(0.2, vec![0.7, 0.8, 0.9]);
        let mut out = vec![0.0; 4];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.7, 0.8, 0.9, 0.0]);
    }

    #[test]
    fn test_render_duplicates_to_all_channels() {
        let mut timeline = Timeline::new(10);
        timeline.push(0.0, vec![0.5, -0.5]);

        let mut out = vec![0.0; 4];
        timeline.render(&mut out, 2);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
        assert_eq!(timeline.position(), 2);
        assert!((timeline.now() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_resampled_chunks_stay_contiguous() {
        // 10 Hz chunks on a 25 Hz device: 0.4 s each
        let mut timeline = Timeline::new(25);
        timeline.push(0.0, resample(&[0.5; 4], 10, 25));
        timeline.push(0.4, resample(&[-0.5; 4], 10, 25));

        let mut out = vec![0.0; 20];
        timeline.render(&mut out, 1);
        assert_eq!(&out[..10], &[0.5; 10]);
        assert_eq!(&out[10..], &[-0.5; 10]);
        assert!((timeline.now() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_empty_chunk_is_ignored() {
        let mut timeline = Timeline::new(10);
        timeline.push(0.0, Vec::new());
        assert_eq!(timeline.queued_chunks(), 0);
    }
}
