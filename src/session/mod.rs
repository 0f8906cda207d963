//! A running capture + channel + playback session
//!
//! Once started, a session is a single task. Stop requests, channel events
//! and captured frames all arrive at one `select!` loop and are handled to
//! completion one at a time, so the engine and its playback timeline are
//! never shared.

pub mod controller;

pub use controller::{SessionController, StopHandle};

use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::audio::capture::{CaptureEvent, CaptureStream};
use crate::network::channel::{Channel, ChannelEvent};
use crate::protocol::engine::ProtocolEngine;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was called
    Stopped,
    /// The endpoint closed the channel
    RemoteClosed(Option<String>),
    /// The channel failed while streaming
    ChannelFailed(String),
    /// The input device failed while streaming
    DeviceFailed(String),
}

impl SessionEnd {
    /// Whether the end was caused by a failure rather than a request
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionEnd::ChannelFailed(_) | SessionEnd::DeviceFailed(_))
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Stopped => write!(f, "stopped"),
            SessionEnd::RemoteClosed(Some(reason)) => {
                write!(f, "connection closed by server: {}", reason)
            }
            SessionEnd::RemoteClosed(None) => write!(f, "connection closed by server"),
            SessionEnd::ChannelFailed(reason) => write!(f, "connection lost: {}", reason),
            SessionEnd::DeviceFailed(reason) => write!(f, "microphone failed: {}", reason),
        }
    }
}

/// Resolves once the stop flag is raised or its sender is gone
pub(crate) async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stopping| *stopping).await;
}

/// Release everything a session holds, in a fixed order: stop capture,
/// release playback, release the input device, then close the channel.
///
/// Every step is idempotent, so this also rolls back a partial start.
pub(crate) async fn teardown(
    capture: &mut dyn CaptureStream,
    engine: &mut ProtocolEngine,
    channel: Option<&mut Channel>,
) {
    capture.disconnect();
    engine.close();
    capture.release();
    if let Some(channel) = channel {
        channel.close().await;
    }
}

/// Resources owned by one streaming session
pub(crate) struct Session {
    pub(crate) engine: ProtocolEngine,
    pub(crate) channel: Channel,
    pub(crate) capture: Box<dyn CaptureStream>,
    pub(crate) capture_rx: mpsc::Receiver<CaptureEvent>,
    pub(crate) stop_rx: watch::Receiver<bool>,
}

impl Session {
    /// Drive the session until it is stopped or fails, then tear it down
    pub(crate) async fn run(mut self) -> SessionEnd {
        let end = loop {
            tokio::select! {
                biased;

                _ = stopped(&mut self.stop_rx) => break SessionEnd::Stopped,

                event = self.channel.recv() => match event {
                    Some(ChannelEvent::Text(payload)) => {
                        self.engine.handle_inbound(&payload);
                    }
                    Some(ChannelEvent::Binary(data)) => {
                        debug!(bytes = data.len(), "Ignoring binary inbound message");
                    }
                    Some(ChannelEvent::Closed(reason)) => break SessionEnd::RemoteClosed(reason),
                    Some(ChannelEvent::Error(reason)) => break SessionEnd::ChannelFailed(reason),
                    None => break SessionEnd::RemoteClosed(None),
                },

                event = self.capture_rx.recv() => match event {
                    Some(CaptureEvent::Frame(frame)) => {
                        let Some(message) = self.engine.outbound_frame(frame) else {
                            continue;
                        };
                        match self.channel.try_send(message) {
                            Ok(true) => {}
                            Ok(false) => self.engine.record_frame_dropped(),
                            Err(e) => break SessionEnd::ChannelFailed(e.to_string()),
                        }
                    }
                    Some(CaptureEvent::Failed(e)) => break SessionEnd::DeviceFailed(e.to_string()),
                    None => break SessionEnd::DeviceFailed("capture stream ended".to_string()),
                },
            }
        };

        if end.is_failure() {
            error!("Session ended: {}", end);
        } else {
            info!("Session ended: {}", end);
        }

        teardown(
            self.capture.as_mut(),
            &mut self.engine,
            Some(&mut self.channel),
        )
        .await;
        self.capture_rx.close();

        let stats = self.engine.stats();
        info!(
            frames_sent = stats.frames_sent,
            frames_dropped = stats.frames_dropped,
            frames_discarded = stats.frames_discarded,
            chunks_scheduled = stats.chunks_scheduled,
            chunks_dropped = stats.chunks_dropped,
            decode_errors = stats.decode_errors,
            malformed_messages = stats.malformed_messages,
            server_errors = stats.server_errors,
            "Session statistics"
        );
        if stats.frames_dropped > 0 {
            warn!(
                "{} frames dropped because the channel could not keep up",
                stats.frames_dropped
            );
        }

        end
    }
}
