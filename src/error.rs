//! Error types for the voice link client

use thiserror::Error;

use crate::protocol::credentials::CredentialSlot;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends (or prevents) the session.
    ///
    /// Errors scoped to a single message (`DecodeError`, `MalformedMessage`)
    /// and suspended playback are not fatal; device and channel failures are.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Error::Audio(AudioError::PlaybackUnavailable(_)) => false,
            Error::Audio(_) => true,
            Error::Codec(_) => false,
            Error::Channel(ChannelError::MalformedMessage(_)) => false,
            Error::Channel(_) => true,
            Error::Session(_) => true,
            Error::Config(_) | Error::Io(_) => true,
        }
    }
}

/// Audio subsystem errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Playback unavailable: {0}")]
    PlaybackUnavailable(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Failed to decode audio chunk: {0}")]
    Decode(String),
}

/// Channel transport and protocol errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Channel closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Missing credential: {0}")]
    MissingCredential(CredentialSlot),

    #[error("A session is already active")]
    AlreadyActive,

    #[error("Session start cancelled by stop")]
    Cancelled,
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
