use crate::correlator::{OrderReply, RequestCorrelator};
use crate::error::TradeWsError;
use crate::handshake::{AuthHandshake, ConnectReply};
use crate::keepalive::KeepaliveTimer;
use crate::notifier::{self, Notice, NotificationSink};
use crate::reconnect::ReconnectPolicy;
use crate::requests::{OrderCreateRequest, OutboundFrame, PingRequest};
use crate::responses::InboundFrame;
use crate::router::MessageRouter;
use crate::transport::{Connection, Connector, TransportEvent};
use chrono::Utc;
use configuration::{ExchangeCredentials, TradeWsSettings};
use core_types::OrderRequest;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

const CHANNEL_NAME: &str = "Bybit Trading WebSocket";
const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of the trade-channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Authenticated,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requests from `TradeClient` handles.
pub(crate) enum Command {
    Connect(ConnectReply),
    SubmitOrder { order: OrderRequest, reply: OrderReply },
    Disconnect(oneshot::Sender<()>),
}

/// Things the session schedules for itself: dial results and timer expiries.
pub(crate) enum SessionEvent {
    Dialed {
        epoch: u64,
        result: Result<Connection, TradeWsError>,
    },
    HandshakeTimeout {
        epoch: u64,
    },
    OrderTimeout {
        request_id: String,
    },
    KeepaliveTick,
    ReconnectDue,
}

/// Static parameters of a session.
#[derive(Clone)]
pub(crate) struct SessionConfig {
    pub url: String,
    pub credentials: ExchangeCredentials,
    pub recv_window_ms: u64,
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub auth_expiry_lookahead: Duration,
    pub order_timeout: Duration,
    pub ping_interval: Duration,
}

impl SessionConfig {
    pub fn new(credentials: &ExchangeCredentials, settings: &TradeWsSettings) -> Self {
        let mut ping_interval = settings.ping_interval();
        if ping_interval < MIN_PING_INTERVAL {
            tracing::warn!(
                ping_interval_secs = settings.ping_interval_secs,
                "Ping interval too short, using {:?}.",
                MIN_PING_INTERVAL
            );
            ping_interval = MIN_PING_INTERVAL;
        }
        Self {
            url: settings.endpoint_url(),
            credentials: credentials.clone(),
            recv_window_ms: settings.recv_window_ms,
            connect_timeout: settings.connect_timeout(),
            auth_timeout: settings.auth_timeout(),
            auth_expiry_lookahead: settings.auth_expiry_lookahead(),
            order_timeout: settings.order_timeout(),
            ping_interval,
        }
    }
}

/// The connection manager.
///
/// Runs as one task and is the only owner of the connection state, the pending
/// order table, the handshake slot and every timer handle. Handles talk to it
/// through `Command`s; timers and the dialer report back through `SessionEvent`s.
pub(crate) struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    /// Queue to the notification delivery task, when a sink is configured.
    notices: Option<mpsc::UnboundedSender<Notice>>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    connection: Option<Connection>,
    /// Bumped on every dial and on shutdown; timers and dial results carry the
    /// epoch they were created in.
    epoch: u64,
    /// Set by an explicit disconnect, cleared by the next explicit connect.
    shutdown: bool,
    handshake: AuthHandshake,
    correlator: RequestCorrelator,
    keepalive: KeepaliveTimer,
    reconnect: ReconnectPolicy,
    reconnect_timer: Option<AbortHandle>,
    router: MessageRouter,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        reconnect: ReconnectPolicy,
        connector: Arc<dyn Connector>,
        sink: Option<Arc<dyn NotificationSink>>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
        router: MessageRouter,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            notices: sink.map(notifier::spawn_delivery),
            commands,
            events_tx,
            events_rx,
            state_tx,
            connection: None,
            epoch: 0,
            shutdown: false,
            handshake: AuthHandshake::new(),
            correlator: RequestCorrelator::new(),
            keepalive: KeepaliveTimer::new(),
            reconnect,
            reconnect_timer: None,
            router,
        }
    }

    /// Processes commands, timer events and socket events until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        tracing::debug!("All trade client handles dropped, stopping session.");
                        self.close(TradeWsError::ClientClosed);
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.on_session_event(event),
                event = next_transport_event(&mut self.connection) => self.on_transport_event(event),
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// The single place state changes. Leaving `Authenticated` always stops the keepalive.
    fn set_state(&mut self, state: ConnectionState) {
        let previous = self.state();
        if state != ConnectionState::Authenticated && self.keepalive.is_active() {
            tracing::debug!("Stopping trade channel keepalive.");
            self.keepalive.stop();
        }
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Trade channel state change.");
            self.state_tx.send_replace(state);
        }
    }

    // --- Commands ---

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => self.connect(reply),
            Command::SubmitOrder { order, reply } => self.submit_order(order, reply),
            Command::Disconnect(done) => {
                self.close(TradeWsError::ConnectionLost);
                let _ = done.send(());
            }
        }
    }

    fn connect(&mut self, reply: ConnectReply) {
        match self.state() {
            ConnectionState::Authenticated => {
                let _ = reply.send(Ok(()));
            }
            ConnectionState::Connecting | ConnectionState::Authenticating => {
                self.handshake.add_waiter(reply);
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                self.shutdown = false;
                self.reconnect.reset();
                self.cancel_reconnect_timer();
                self.handshake.add_waiter(reply);
                self.dial();
            }
        }
    }

    fn submit_order(&mut self, order: OrderRequest, reply: OrderReply) {
        if self.state() != ConnectionState::Authenticated {
            let _ = reply.send(Err(TradeWsError::NotConnected));
            return;
        }
        if let Err(e) = order.validate() {
            let _ = reply.send(Err(e.into()));
            return;
        }

        let request_id = self.correlator.next_request_id();
        let symbol = order.symbol.clone();
        let frame = OutboundFrame::OrderCreate(OrderCreateRequest::new(
            request_id.clone(),
            Utc::now().timestamp_millis(),
            self.config.recv_window_ms,
            order,
        ));

        if let Err(e) = self.send(&frame) {
            tracing::error!(request_id = %request_id, error = %e, "Failed to send order request.");
            let _ = reply.send(Err(e));
            return;
        }
        tracing::debug!(request_id = %request_id, symbol = %symbol, "Order request sent.");
        self.correlator
            .register(request_id, reply, self.config.order_timeout, &self.events_tx);
    }

    /// Explicit shutdown. Nothing reconnects until the next `connect()`.
    fn close(&mut self, reason: TradeWsError) {
        self.shutdown = true;
        self.epoch += 1;
        self.cancel_reconnect_timer();
        self.set_state(ConnectionState::Closing);
        self.handshake.fail(reason.clone());
        let drained = self.correlator.drain(reason);
        // Dropping the connection closes the socket.
        self.connection = None;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(drained, "Trade WebSocket disconnected.");
    }

    // --- Socket lifecycle ---

    fn dial(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.set_state(ConnectionState::Connecting);

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let connect_timeout = self.config.connect_timeout;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(connect_timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        url = %url,
                        timeout_ms = connect_timeout.as_millis() as u64,
                        "Trade WebSocket dial timed out."
                    );
                    Err(TradeWsError::Transport("connect timed out".to_string()))
                }
            };
            let _ = events.send(SessionEvent::Dialed { epoch, result });
        });
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Dialed { epoch, result } => self.on_dialed(epoch, result),
            SessionEvent::HandshakeTimeout { epoch } => self.on_handshake_timeout(epoch),
            SessionEvent::OrderTimeout { request_id } => {
                self.correlator.expire(&request_id);
            }
            SessionEvent::KeepaliveTick => self.on_keepalive_tick(),
            SessionEvent::ReconnectDue => self.on_reconnect_due(),
        }
    }

    fn on_dialed(&mut self, epoch: u64, result: Result<Connection, TradeWsError>) {
        if epoch != self.epoch || self.state() != ConnectionState::Connecting {
            // Dropping a late connection closes it.
            tracing::debug!(epoch, "Discarding stale dial result.");
            return;
        }

        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                self.set_state(ConnectionState::Authenticating);
                let frame = self.handshake.begin(
                    &self.config.credentials.api_key,
                    &self.config.credentials.secret,
                    self.config.auth_expiry_lookahead,
                    self.config.auth_timeout,
                    self.epoch,
                    &self.events_tx,
                );
                if let Err(e) = self.send(&frame) {
                    tracing::error!(error = %e, "Failed to send auth request.");
                    self.handshake.fail(e);
                    self.on_connection_lost();
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "Trade WebSocket connection failed.");
                self.notify(format!("⛓️‍💥🔴 {CHANNEL_NAME} error: {error}"));
                self.handshake.fail(error);
                self.on_connection_lost();
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.route(&text),
            TransportEvent::Error(message) => {
                tracing::error!(error = %message, "Trade WebSocket error.");
                self.notify(format!("⛓️‍💥🔴 {CHANNEL_NAME} error: {message}"));
                // The close event that follows owns reconnection.
                if self.state() != ConnectionState::Authenticated {
                    self.handshake.fail(TradeWsError::Transport(message));
                }
            }
            TransportEvent::Closed => {
                tracing::warn!("Trade WebSocket closed unexpectedly.");
                self.on_connection_lost();
            }
        }
    }

    /// Unintended loss of the socket: fail everything in flight and schedule one reconnect.
    fn on_connection_lost(&mut self) {
        self.connection = None;
        self.set_state(ConnectionState::Disconnected);
        self.handshake.fail(TradeWsError::ConnectionLost);
        let drained = self.correlator.drain(TradeWsError::ConnectionLost);
        if drained > 0 {
            tracing::warn!(drained, "Rejected pending orders after connection loss.");
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.shutdown {
            return;
        }
        self.cancel_reconnect_timer();

        let Some(delay) = self.reconnect.next_delay() else {
            let error = TradeWsError::MaxReconnectAttemptsExceeded(self.reconnect.max_attempts());
            tracing::error!("Max reconnection attempts reached, trade channel stays disconnected.");
            self.notify_error(format!("{CHANNEL_NAME} gave up reconnecting"), error);
            return;
        };

        let attempt = self.reconnect.attempt();
        let max_attempts = self.reconnect.max_attempts();
        tracing::info!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling trade WebSocket reconnection."
        );
        self.notify(format!(
            "⛓️‍💥🟡 {CHANNEL_NAME} disconnected, reconnecting in {}s (attempt {attempt}/{max_attempts})...",
            delay.as_secs_f64()
        ));

        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::ReconnectDue);
        });
        self.reconnect_timer = Some(task.abort_handle());
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
    }

    fn on_reconnect_due(&mut self) {
        self.reconnect_timer = None;
        if self.shutdown || self.state() != ConnectionState::Disconnected {
            return;
        }
        tracing::info!(attempt = self.reconnect.attempt(), "Reconnecting to trade WebSocket.");
        self.dial();
    }

    // --- Handshake ---

    fn on_auth_ack(&mut self, success: bool, code: i64, message: &str) {
        if self.state() != ConnectionState::Authenticating || !self.handshake.is_in_flight() {
            tracing::warn!(success, code, "Ignoring auth acknowledgement outside a handshake.");
            return;
        }

        match self.handshake.complete(success, code, message) {
            Ok(()) => {
                self.set_state(ConnectionState::Authenticated);
                self.reconnect.reset();
                self.keepalive.start(self.config.ping_interval, &self.events_tx);
                tracing::info!("Trade channel authenticated.");
                self.notify(format!("⛓️✅ {CHANNEL_NAME} authenticated"));
            }
            Err(error) => {
                tracing::error!(error = %error, "Trade channel authentication rejected.");
                self.notify_error(format!("⛓️❌ {CHANNEL_NAME} authentication error"), error);
                // Rejected credentials are terminal: close without scheduling a retry.
                self.connection = None;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    fn on_handshake_timeout(&mut self, epoch: u64) {
        if epoch != self.epoch
            || self.state() != ConnectionState::Authenticating
            || !self.handshake.is_in_flight()
        {
            return;
        }
        tracing::warn!("Trade channel authentication timed out.");
        self.notify_error(
            format!("⛓️❌ {CHANNEL_NAME} authentication error"),
            TradeWsError::AuthTimeout,
        );
        self.handshake.fail(TradeWsError::AuthTimeout);
        self.on_connection_lost();
    }

    fn on_keepalive_tick(&mut self) {
        if self.state() != ConnectionState::Authenticated {
            return;
        }
        if let Err(e) = self.send(&OutboundFrame::Ping(PingRequest::default())) {
            tracing::warn!(error = %e, "Failed to send keepalive ping.");
        }
    }

    // --- Frames ---

    fn route(&mut self, text: &str) {
        let Some(frame) = self.router.classify(text) else {
            return;
        };
        match frame {
            InboundFrame::AuthAck { success, code, message } => self.on_auth_ack(success, code, &message),
            InboundFrame::Heartbeat => {}
            InboundFrame::OrderResponse(response) => match response.request_id.clone() {
                Some(request_id) if self.correlator.contains(&request_id) => {
                    let result = response.into_result(request_id.clone());
                    self.correlator.resolve(&request_id, result);
                }
                _ => self.router.publish(response.raw),
            },
            InboundFrame::Generic(value) => self.router.publish(value),
        }
    }

    /// Writes a frame. Only auth frames may go out before the session is authenticated.
    fn send(&self, frame: &OutboundFrame) -> Result<(), TradeWsError> {
        let permitted = match self.state() {
            ConnectionState::Authenticated => true,
            ConnectionState::Authenticating => frame.is_auth(),
            _ => false,
        };
        let connection = self
            .connection
            .as_ref()
            .filter(|_| permitted)
            .ok_or(TradeWsError::NotConnected)?;
        tracing::trace!(op = frame.op(), "Writing trade channel frame.");
        connection.send(frame.to_text()?)
    }

    // --- Notifications ---

    fn notify(&self, text: String) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(Notice::Info(text));
        }
    }

    fn notify_error(&self, text: String, error: TradeWsError) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(Notice::Error(text, error));
        }
    }
}

async fn next_transport_event(connection: &mut Option<Connection>) -> TransportEvent {
    match connection {
        Some(connection) => connection.next_event().await,
        None => std::future::pending().await,
    }
}
