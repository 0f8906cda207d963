//! Channel protocol: handshake credentials, inbound messages and the
//! state machine tying them to playback and collaborators

pub mod credentials;
pub mod engine;
pub mod messages;

pub use credentials::{CredentialSet, CredentialSlot};
pub use engine::{ChannelState, EngineStats, InboundOutcome, ProtocolEngine};
pub use messages::{SearchHit, SearchResult, ServerMessage};
