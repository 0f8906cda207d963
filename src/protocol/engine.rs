//! Channel protocol state machine
//!
//! ```text
//! Idle ──begin_connect──► Connecting ──on_open──► Open ──on_handshake_sent──► Streaming
//!   │                         │                    │                            │
//!   └─────────────────────────┴───────── close ────┴────────────────────────────┴──► Closed
//! ```
//!
//! The engine does no I/O. It hands back what has to be written and
//! dispatches what was read, so the session loop stays the only place that
//! touches the channel.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::audio::buffer::AudioFrame;
use crate::audio::playback::{PlaybackScheduler, ScheduledChunk};
use crate::codec::decode_chunk;
use crate::collaborators::Collaborators;
use crate::error::ChannelError;
use crate::network::channel::Outbound;
use crate::protocol::credentials::CredentialSet;
use crate::protocol::messages::ServerMessage;

/// Lifecycle of the channel as seen by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    /// Connected, handshake not yet sent
    Open,
    Streaming,
    Closed,
}

impl ChannelState {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Streaming => "streaming",
            ChannelState::Closed => "closed",
        }
    }
}

/// What happened to one inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    /// An audio chunk was placed on the playback timeline
    Scheduled(ScheduledChunk),
    /// An audio chunk was discarded (decode failure or playback suspended)
    Dropped,
    /// A collaborator was notified
    Notified,
    /// The endpoint reported an error
    Reported,
    /// Unknown type, or not streaming
    Ignored,
    /// Not a protocol message
    Malformed,
}

/// Counters kept for the lifetime of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames_sent: u64,
    /// Frames the outbound queue had no room for
    pub frames_dropped: u64,
    /// Frames captured before streaming began
    pub frames_discarded: u64,
    pub chunks_scheduled: u64,
    pub chunks_dropped: u64,
    pub decode_errors: u64,
    pub malformed_messages: u64,
    pub server_errors: u64,
}

/// Protocol engine for one session
pub struct ProtocolEngine {
    state: ChannelState,
    state_tx: Arc<watch::Sender<ChannelState>>,
    credentials: Arc<CredentialSet>,
    scheduler: PlaybackScheduler,
    collaborators: Collaborators,
    /// Set by the first scheduled chunk, cleared by `audio_end`
    in_burst: bool,
    stats: EngineStats,
}

impl ProtocolEngine {
    pub fn new(
        credentials: Arc<CredentialSet>,
        scheduler: PlaybackScheduler,
        collaborators: Collaborators,
        state_tx: Arc<watch::Sender<ChannelState>>,
    ) -> Self {
        state_tx.send_replace(ChannelState::Idle);
        Self {
            state: ChannelState::Idle,
            state_tx,
            credentials,
            scheduler,
            collaborators,
            in_burst: false,
            stats: EngineStats::default(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// `Idle -> Connecting`
    pub fn begin_connect(&mut self) -> Result<(), ChannelError> {
        self.transition(ChannelState::Idle, ChannelState::Connecting, "connect")
    }

    /// `Connecting -> Open`. Returns the handshake, which must be the first
    /// message written to the channel.
    pub fn on_open(&mut self) -> Result<Outbound, ChannelError> {
        let handshake = self
            .credentials
            .to_handshake()
            .map_err(|e| ChannelError::SendFailed(format!("handshake encoding: {}", e)))?;
        self.transition(ChannelState::Connecting, ChannelState::Open, "open")?;
        Ok(Outbound::Text(handshake))
    }

    /// `Open -> Streaming`, once the handshake is on its way
    pub fn on_handshake_sent(&mut self) -> Result<(), ChannelError> {
        self.transition(ChannelState::Open, ChannelState::Streaming, "handshake_sent")?;
        self.collaborators.search.on_search_pending();
        info!("Handshake sent, streaming");
        Ok(())
    }

    /// Wrap a captured frame for sending, or discard it if not streaming
    pub fn outbound_frame(&mut self, frame: AudioFrame) -> Option<Outbound> {
        if self.state != ChannelState::Streaming {
            self.stats.frames_discarded += 1;
            return None;
        }
        self.stats.frames_sent += 1;
        Some(Outbound::Binary(frame.pcm))
    }

    /// Account for a frame captured before streaming and found late
    pub fn record_frame_discarded(&mut self) {
        self.stats.frames_discarded += 1;
    }

    /// Account for a frame that was handed out but could not be queued
    pub fn record_frame_dropped(&mut self) {
        self.stats.frames_sent = self.stats.frames_sent.saturating_sub(1);
        self.stats.frames_dropped += 1;
    }

    /// Dispatch one inbound text payload
    pub fn handle_inbound(&mut self, payload: &str) -> InboundOutcome {
        if self.state != ChannelState::Streaming {
            debug!(state = self.state.name(), "Inbound message outside streaming, ignored");
            return InboundOutcome::Ignored;
        }

        let message = match ServerMessage::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed_messages += 1;
                warn!("Dropping inbound payload: {}", e);
                return InboundOutcome::Malformed;
            }
        };

        match message {
            ServerMessage::AudioChunk { data } => self.play_chunk(&data),
            ServerMessage::AudioEnd => {
                self.in_burst = false;
                self.collaborators.playback.on_playback_end();
                InboundOutcome::Notified
            }
            ServerMessage::TurnEnd { transcript } => {
                debug!(chars = transcript.len(), "Turn ended");
                self.collaborators.transcript.on_turn(&transcript);
                self.collaborators.search.on_search_active();
                if let Some(listener) = &self.collaborators.turn_complete {
                    listener.on_turn_complete(&transcript);
                }
                InboundOutcome::Notified
            }
            ServerMessage::SearchResult(result) => {
                self.collaborators.search.on_search_result(&result);
                InboundOutcome::Notified
            }
            ServerMessage::AssistantResponse { text } => {
                self.collaborators.transcript.on_assistant_text(&text);
                InboundOutcome::Notified
            }
            ServerMessage::Error { message } => {
                self.stats.server_errors += 1;
                error!("Endpoint error: {}", message);
                InboundOutcome::Reported
            }
            ServerMessage::Unknown => {
                debug!("Unknown message type, ignored");
                InboundOutcome::Ignored
            }
        }
    }

    fn play_chunk(&mut self, data: &str) -> InboundOutcome {
        let samples = match decode_chunk(data) {
            Ok(samples) => samples,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!("Dropping audio chunk: {}", e);
                return InboundOutcome::Dropped;
            }
        };

        match self.scheduler.schedule(samples) {
            Ok(Some(chunk)) => {
                if !self.in_burst {
                    self.in_burst = true;
                    self.collaborators.playback.on_playback_start();
                }
                InboundOutcome::Scheduled(chunk)
            }
            Ok(None) => InboundOutcome::Dropped,
            Err(e) => {
                error!("Playback suspended for this session: {}", e);
                InboundOutcome::Dropped
            }
        }
    }

    /// Move to `Closed` and reset playback. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        debug!(from = self.state.name(), "Closing protocol engine");
        self.scheduler.reset();
        self.in_burst = false;
        self.set_state(ChannelState::Closed);
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            chunks_scheduled: self.scheduler.chunks_scheduled(),
            chunks_dropped: self.scheduler.chunks_dropped() + self.stats.decode_errors,
            ..self.stats
        }
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    fn transition(
        &mut self,
        from: ChannelState,
        to: ChannelState,
        event: &'static str,
    ) -> Result<(), ChannelError> {
        if self.state != from {
            return Err(ChannelError::InvalidTransition {
                from: self.state.name(),
                event,
            });
        }
        self.set_state(to);
        Ok(())
    }

    fn set_state(&mut self, state: ChannelState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

impl Drop for ProtocolEngine {
    fn drop(&mut self) {
        self.close();
    }
}
