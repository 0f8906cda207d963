//! # Voice Link
//!
//! Streams live microphone audio to a remote voice endpoint over one
//! persistent WebSocket and plays back the synthesized audio it returns,
//! while transcript turns, search results and errors travel on the same
//! channel as JSON events.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Session Controller                            │
//! │        start() / stop() / StopHandle, owns one Session at a time     │
//! └───────────────┬──────────────────────────────┬───────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌──────────────────────────┐     ┌──────────────────────────────────────┐
//! │   Capture Pipeline       │     │      Channel Protocol Engine         │
//! │   (audio::capture)       │     │      (protocol::engine)              │
//! │  cpal input ─► mono ─►   │     │  Idle ─► Connecting ─► Open ─►       │
//! │  FrameAssembler(4096) ─► │────►│  Streaming ─► Closed                 │
//! │  codec::encode_frame     │     │  handshake first, then raw PCM       │
//! └──────────────────────────┘     └───────┬─────────────────────┬────────┘
//!                                          │ audio_chunk         │ turn_end,
//!                                          ▼                     │ *_result,
//!                          ┌─────────────────────────────┐       │ audio_end
//!                          │ codec::decode_chunk         │       ▼
//!                          │ Playback Scheduler          │  Collaborators
//!                          │ start = max(next, now)      │  (transcript,
//!                          │ (audio::playback)           │   search, status)
//!                          └──────────────┬──────────────┘
//!                                         ▼
//!                          ┌─────────────────────────────┐
//!                          │ Device output timeline      │
//!                          │ (audio::output, cpal)       │
//!                          └─────────────────────────────┘
//! ```
//!
//! The session itself runs as a single tokio task: inbound channel events,
//! captured frames and the stop signal are all dispatched from one
//! `select!` loop, so the playback timeline needs no locking.

pub mod audio;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Capture sample rate expected by the speech-transcription endpoint
    pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 16_000;

    /// Sample rate of synthesized audio chunks received from the endpoint
    pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 40_000;

    /// Samples per outbound frame
    pub const DEFAULT_BLOCK_SIZE: usize = 4096;

    /// Scale applied when quantizing outbound samples
    pub const PCM_ENCODE_SCALE: f32 = 32767.0;

    /// Divisor applied when expanding inbound samples
    pub const PCM_DECODE_SCALE: f32 = 32768.0;

    /// Default endpoint for the voice channel
    pub const DEFAULT_CHANNEL_URL: &str = "ws://127.0.0.1:8000/ws";

    /// Bounded queue between the session and the WebSocket writer
    pub const CHANNEL_QUEUE_CAPACITY: usize = 256;

    /// Bounded queue between the capture thread and the session (in frames)
    pub const CAPTURE_QUEUE_CAPACITY: usize = 32;

    /// How long a closing channel may take to flush its close frame
    pub const CHANNEL_CLOSE_TIMEOUT_MS: u64 = 500;
}
