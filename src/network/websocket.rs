//! WebSocket transport
//!
//! One pump task owns the socket. It forwards queued outbound messages,
//! turns inbound frames into [`ChannelEvent`]s and answers pings itself.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::constants::CHANNEL_QUEUE_CAPACITY;
use crate::error::ChannelError;
use crate::network::channel::{Channel, ChannelEvent, Connector, Outbound};

/// Opens WebSocket channels
#[derive(Debug, Clone)]
pub struct WsConnector {
    queue: usize,
}

impl WsConnector {
    /// `queue` bounds both the outbound and the inbound queue
    pub fn new(queue: usize) -> Self {
        Self {
            queue: queue.max(1),
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(CHANNEL_QUEUE_CAPACITY)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Channel, ChannelError> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("{}: {}", url, e)))?;
        info!("Connected to {}", url);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(self.queue);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ChannelEvent>(self.queue);

        let pump = tokio::spawn(async move {
            let (mut ws_sink, mut ws_stream) = ws_stream.split();

            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        let message = match outbound {
                            Some(Outbound::Text(text)) => Message::Text(text.into()),
                            Some(Outbound::Binary(pcm)) => Message::Binary(pcm),
                            Some(Outbound::Close) | None => {
                                let _ = ws_sink.send(Message::Close(None)).await;
                                break;
                            }
                        };
                        if let Err(e) = ws_sink.send(message).await {
                            error!("WebSocket send failed: {}", e);
                            let _ = inbound_tx.send(ChannelEvent::Error(e.to_string())).await;
                            break;
                        }
                    }

                    inbound = ws_stream.next() => {
                        let event = match inbound {
                            Some(Ok(Message::Text(text))) => {
                                ChannelEvent::Text(text.as_str().to_string())
                            }
                            Some(Ok(Message::Binary(data))) => ChannelEvent::Binary(data),
                            Some(Ok(Message::Ping(payload))) => {
                                debug!("Ping received");
                                if let Err(e) = ws_sink.send(Message::Pong(payload)).await {
                                    warn!("Failed to answer ping: {}", e);
                                }
                                continue;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                let reason = frame
                                    .map(|f| f.reason.as_str().to_string())
                                    .filter(|reason| !reason.is_empty());
                                let _ = inbound_tx.send(ChannelEvent::Closed(reason)).await;
                                break;
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = inbound_tx.send(ChannelEvent::Error(e.to_string())).await;
                                break;
                            }
                            None => {
                                let _ = inbound_tx.send(ChannelEvent::Closed(None)).await;
                                break;
                            }
                        };
                        if inbound_tx.send(event).await.is_err() {
                            // Session side went away
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }

            debug!("WebSocket pump finished");
        });

        Ok(Channel::new(outbound_tx, inbound_rx, Some(pump)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused() {
        // Port 9 (discard) is not expected to host a WebSocket server
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let result = WsConnector::default().connect(&url).await;
        assert!(matches!(result, Err(ChannelError::ConnectionFailed(_))));
    }
}
