use crate::error::TradeWsError;
use crate::notifier::NotificationSink;
use crate::reconnect::ReconnectPolicy;
use crate::router::MessageRouter;
use crate::session::{Command, ConnectionState, Session, SessionConfig};
use crate::transport::{Connector, TungsteniteConnector};
use crate::TradeChannel;
use async_trait::async_trait;
use configuration::{ExchangeCredentials, TradeWsSettings};
use core_types::{OrderRequest, OrderResult};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// A handle to one authenticated trade-channel session.
///
/// The session itself runs as a background task spawned by the constructor, so
/// a `TradeClient` must be created inside a Tokio runtime. Handles are cheap to
/// clone; the session stops once the last one is dropped.
#[derive(Clone)]
pub struct TradeClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    generic: broadcast::Sender<Value>,
}

impl TradeClient {
    /// Creates a client that talks to the real exchange over `tokio-tungstenite`.
    pub fn new(
        credentials: &ExchangeCredentials,
        settings: &TradeWsSettings,
        notifier: Option<Arc<dyn NotificationSink>>,
    ) -> Self {
        Self::with_connector(credentials, settings, Arc::new(TungsteniteConnector), notifier)
    }

    /// Creates a client over a custom transport.
    pub fn with_connector(
        credentials: &ExchangeCredentials,
        settings: &TradeWsSettings,
        connector: Arc<dyn Connector>,
        notifier: Option<Arc<dyn NotificationSink>>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let router = MessageRouter::new();
        let generic = router.sender();

        let reconnect = ReconnectPolicy::new(
            settings.reconnect_base_delay(),
            settings.reconnect_max_delay(),
            settings.max_reconnect_attempts,
        );
        let session = Session::new(
            SessionConfig::new(credentials, settings),
            reconnect,
            connector,
            notifier,
            commands_rx,
            state_tx,
            router,
        );
        tokio::spawn(session.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            generic,
        }
    }

    /// Opens the socket and authenticates. Resolves once the session is `Authenticated`.
    ///
    /// Calling it while already authenticated resolves immediately; calling it
    /// while a handshake is running joins that handshake.
    pub async fn connect(&self) -> Result<(), TradeWsError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Connect(reply))?;
        rx.await.map_err(|_| TradeWsError::ClientClosed)?
    }

    /// Sends one `order.create` request and waits for its matching response.
    ///
    /// The returned `OrderResult` may still carry a non-zero `ret_code`: the
    /// exchange answered, but rejected the order.
    pub async fn submit_order(&self, order: OrderRequest) -> Result<OrderResult, TradeWsError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::SubmitOrder { order, reply })?;
        rx.await.map_err(|_| TradeWsError::ClientClosed)?
    }

    /// Closes the socket and stops automatic reconnection until the next `connect()`.
    ///
    /// Pending orders and an in-flight handshake are rejected with `ConnectionLost`.
    pub async fn disconnect(&self) {
        let (done, rx) = oneshot::channel();
        if self.send_command(Command::Disconnect(done)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Frames the client does not consume itself: topic pushes and unmatched order responses.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.generic.subscribe()
    }

    fn send_command(&self, command: Command) -> Result<(), TradeWsError> {
        self.commands
            .send(command)
            .map_err(|_| TradeWsError::ClientClosed)
    }
}

#[async_trait]
impl TradeChannel for TradeClient {
    async fn connect(&self) -> Result<(), TradeWsError> {
        TradeClient::connect(self).await
    }

    async fn submit_order(&self, order: OrderRequest) -> Result<OrderResult, TradeWsError> {
        TradeClient::submit_order(self, order).await
    }

    async fn disconnect(&self) {
        TradeClient::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        TradeClient::is_connected(self)
    }
}
