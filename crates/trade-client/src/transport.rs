use crate::error::TradeWsError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// What the socket reports back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A complete text frame.
    Message(String),
    /// A read error. Always followed by `Closed`.
    Error(String),
    /// The socket is gone. Sent exactly once per connection.
    Closed,
}

/// An open socket, seen as a pair of channels.
///
/// Dropping the `Connection` closes the socket.
pub struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, events }
    }

    /// Queues a text frame for writing.
    pub fn send(&self, text: String) -> Result<(), TradeWsError> {
        self.outbound.send(text).map_err(|_| TradeWsError::NotConnected)
    }

    /// Waits for the next socket event. A vanished socket task reads as `Closed`.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.events.recv().await.unwrap_or(TransportEvent::Closed)
    }
}

/// Opens sockets for the session, so tests can substitute an in-memory transport.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, TradeWsError>;
}

/// The production connector, backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TradeWsError> {
        tracing::info!(url, "Connecting to trade WebSocket...");
        let (stream, _) = connect_async(url).await?;
        tracing::info!(url, "Trade WebSocket connection established.");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "Failed to write to trade WebSocket.");
                    return;
                }
            }
            // The session dropped its handle, close politely.
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Trade WebSocket close handshake failed.");
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => {
                            tracing::debug!("Ignoring non UTF-8 binary frame of {} bytes", data.len());
                            continue;
                        }
                    },
                    Ok(Message::Ping(data)) => {
                        tracing::trace!("Received ping with {} bytes", data.len());
                        continue;
                    }
                    Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                    Ok(Message::Close(frame)) => {
                        tracing::info!(?frame, "Trade WebSocket closed by peer.");
                        break;
                    }
                    Err(e) => {
                        let _ = events_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                };
                if events_tx.send(event).is_err() {
                    // Session no longer listening to this socket.
                    return;
                }
            }
            let _ = events_tx.send(TransportEvent::Closed);
        });

        Ok(Connection::new(outbound_tx, events_rx))
    }
}
