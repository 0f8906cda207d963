//! Bidirectional channel handle
//!
//! A `Channel` is the session-side end of one connection. Writes go into a
//! bounded queue drained by the connection's pump task, reads come out of a
//! second queue the pump fills. The transport behind the pump is hidden
//! behind [`Connector`].

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use url::Url;

use crate::constants::CHANNEL_CLOSE_TIMEOUT_MS;
use crate::error::ChannelError;

/// Message written to the channel
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON text (the handshake)
    Text(String),
    /// Raw PCM frame
    Binary(Bytes),
    /// Close the connection
    Close,
}

/// Event read from the channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Text(String),
    Binary(Bytes),
    /// The remote end closed the connection
    Closed(Option<String>),
    /// The transport failed
    Error(String),
}

/// Opens channels to an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Channel, ChannelError>;
}

/// Session-side handle of an open connection
pub struct Channel {
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Receiver<ChannelEvent>,
    pump: Option<JoinHandle<()>>,
    closed: bool,
}

impl Channel {
    /// Wrap the two queues of a connection and the task that drives it
    pub fn new(
        outbound: mpsc::Sender<Outbound>,
        inbound: mpsc::Receiver<ChannelEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            pump,
            closed: false,
        }
    }

    /// Queue a message, waiting for room
    pub async fn send(&self, message: Outbound) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.outbound
            .send(message)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Queue a message without waiting.
    ///
    /// Returns `Ok(false)` when the queue is full and the message was
    /// discarded.
    pub fn try_send(&self, message: Outbound) -> Result<bool, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        match self.outbound.try_send(message) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Closed(_)) => Err(ChannelError::Closed),
        }
    }

    /// Next inbound event; `None` once the pump is gone
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.inbound.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbound.close();

        let deadline = Duration::from_millis(CHANNEL_CLOSE_TIMEOUT_MS);
        if tokio::time::timeout(deadline, self.outbound.send(Outbound::Close))
            .await
            .is_err()
        {
            tracing::debug!("Outbound queue still full at close");
        }

        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(deadline, &mut pump).await.is_err() {
                tracing::warn!("Channel pump did not finish in time, aborting");
                pump.abort();
            }
        }
        tracing::debug!("Channel closed");
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
