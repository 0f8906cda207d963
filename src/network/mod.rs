//! Network subsystem: the channel carrying audio and protocol events

pub mod channel;
pub mod websocket;

pub use channel::{Channel, ChannelEvent, Connector, Outbound};
pub use websocket::WsConnector;
