//! Seam between the session and the audio hardware

use tokio::sync::mpsc;

use crate::audio::capture::{CaptureEvent, CaptureStream, DeviceCapture};
use crate::audio::output::DeviceOutput;
use crate::audio::playback::AudioOutput;
use crate::config::{CaptureConfig, PlaybackConfig};
use crate::error::AudioError;

/// Opens the devices a session needs
pub trait AudioBackend: Send + Sync {
    /// Open the playback output context
    fn open_output(&self, config: &PlaybackConfig) -> Result<Box<dyn AudioOutput>, AudioError>;

    /// Open the input device and start delivering frames to `events`
    fn open_capture(
        &self,
        config: &CaptureConfig,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, AudioError>;
}

/// Audio backend on the platform default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_output(&self, config: &PlaybackConfig) -> Result<Box<dyn AudioOutput>, AudioError> {
        let output = DeviceOutput::open(config.device.as_deref(), config.sample_rate)?;
        Ok(Box::new(output))
    }

    fn open_capture(
        &self,
        config: &CaptureConfig,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let capture = DeviceCapture::open(config, events)?;
        Ok(Box::new(capture))
    }
}
