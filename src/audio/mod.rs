//! Audio subsystem module

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod device;
pub mod output;
pub mod playback;
pub mod resample;

pub use backend::{AudioBackend, CpalBackend};
pub use buffer::{AudioFrame, FrameAssembler};
pub use capture::{CaptureEvent, CaptureStream, DeviceCapture};
pub use device::{list_devices, DeviceInfo};
pub use output::DeviceOutput;
pub use playback::{AudioOutput, PlaybackScheduler, ScheduledChunk};
pub use resample::{resample, StreamResampler};
